use std::time::Duration;

use hcn_wire::{ClientKind, PeerRole, ServerKind, CHAT_TYPE, VERSION_LENGTH};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SessionError};

/// Local identity and protocol knobs for a [`Session`](crate::Session).
///
/// ```
/// use hcn_session::SessionConfig;
/// use hcn_wire::ServerKind;
///
/// let config = SessionConfig {
///     strict_lengths: true,
///     ..SessionConfig::server(ServerKind::Sapp, "1.2")
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// What this endpoint announces in its handshakes.
    pub role: PeerRole,
    /// Version string announced in handshakes.
    pub version: String,
    /// Chat category HCN lines travel on.
    #[serde(default = "default_chat_type")]
    pub chat_type: u32,
    /// Reject packets whose declared lengths disagree with their content.
    #[serde(default)]
    pub strict_lengths: bool,
    /// Reset slots stuck mid-handshake for longer than this on `tick`.
    #[serde(default)]
    pub handshake_timeout: Option<Duration>,
}

fn default_chat_type() -> u32 {
    CHAT_TYPE
}

impl SessionConfig {
    /// Config for a server add-on of the given kind.
    pub fn server(kind: ServerKind, version: impl Into<String>) -> Self {
        Self::with_role(PeerRole::Server(kind), version)
    }

    /// Config for a client add-on of the given kind.
    pub fn client(kind: ClientKind, version: impl Into<String>) -> Self {
        Self::with_role(PeerRole::Client(kind), version)
    }

    fn with_role(role: PeerRole, version: impl Into<String>) -> Self {
        Self {
            role,
            version: version.into(),
            chat_type: CHAT_TYPE,
            strict_lengths: false,
            handshake_timeout: None,
        }
    }

    /// Check the config can produce valid handshakes.
    pub fn validate(&self) -> Result<()> {
        if self.version.is_empty() {
            return Err(SessionError::InvalidConfig("version is empty".into()));
        }
        if !self.version.bytes().all(|byte| byte.is_ascii() && byte != 0) {
            return Err(SessionError::InvalidConfig(
                "version must be ASCII without NUL bytes".into(),
            ));
        }
        if self.version.len() >= VERSION_LENGTH {
            return Err(SessionError::InvalidConfig(format!(
                "version too long ({} bytes, max {})",
                self.version.len(),
                VERSION_LENGTH - 1
            )));
        }
        if self.chat_type == 0 {
            return Err(SessionError::InvalidConfig(
                "chat type 0 is ordinary chat".into(),
            ));
        }
        if self.handshake_timeout == Some(Duration::ZERO) {
            return Err(SessionError::InvalidConfig(
                "handshake timeout must be nonzero".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_set_defaults() {
        let config = SessionConfig::client(ClientKind::Hac2, "1.0");
        assert_eq!(config.role, PeerRole::Client(ClientKind::Hac2));
        assert_eq!(config.chat_type, CHAT_TYPE);
        assert!(!config.strict_lengths);
        assert_eq!(config.handshake_timeout, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_bad_versions() {
        assert!(SessionConfig::server(ServerKind::Sapp, "").validate().is_err());
        assert!(SessionConfig::server(ServerKind::Sapp, "v\u{e9}").validate().is_err());

        let long = "9".repeat(VERSION_LENGTH);
        assert!(matches!(
            SessionConfig::server(ServerKind::Sapp, long).validate(),
            Err(SessionError::InvalidConfig(_))
        ));
    }

    #[test]
    fn validate_rejects_zero_chat_type_and_timeout() {
        let config = SessionConfig {
            chat_type: 0,
            ..SessionConfig::server(ServerKind::Hse, "1")
        };
        assert!(config.validate().is_err());

        let config = SessionConfig {
            handshake_timeout: Some(Duration::ZERO),
            ..SessionConfig::server(ServerKind::Hse, "1")
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn deserializes_with_defaults() {
        let config: SessionConfig =
            serde_json::from_str(r#"{"role":{"server":"phasor"},"version":"2.0"}"#).unwrap();
        assert_eq!(config, SessionConfig::server(ServerKind::Phasor, "2.0"));

        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains(r#""chat_type":6"#));
    }
}
