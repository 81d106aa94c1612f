//! Packet types, connection states and peer roles.
//!
//! Discriminants start at 1 so fixed fields rarely encode to a zero unit.

use std::fmt;

use crate::error::WireError;

/// Packet type carried in every preamble.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PacketType {
    /// Bidirectional. Client opens with it, server answers in kind.
    Handshake = 1,
    /// `key=value` setting, e.g. `SJ=ON`.
    KeyValue = 2,
    /// Batch of typed 4-byte numeric values.
    Datapoint = 3,
    /// Batch of typed 3-float vectors.
    Vector = 4,
    /// Categorized, colored text.
    Text = 5,
}

impl PacketType {
    /// Human-readable packet type name.
    pub fn name(self) -> &'static str {
        match self {
            PacketType::Handshake => "HANDSHAKE",
            PacketType::KeyValue => "KEYVALUE",
            PacketType::Datapoint => "DATAPOINT",
            PacketType::Vector => "VECTOR",
            PacketType::Text => "TEXT",
        }
    }
}

impl TryFrom<u8> for PacketType {
    type Error = WireError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(PacketType::Handshake),
            2 => Ok(PacketType::KeyValue),
            3 => Ok(PacketType::Datapoint),
            4 => Ok(PacketType::Vector),
            5 => Ok(PacketType::Text),
            other => Err(WireError::UnknownPacketType(other)),
        }
    }
}

impl fmt::Display for PacketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Connection state of a slot, also the "intended state" field of a handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum ConnectionState {
    /// Nothing exchanged yet. A handshake is needed.
    #[default]
    None = 1,
    /// Client sent its handshake and waits for the server's reply.
    HandshakeC2S = 2,
    /// Server answered a client handshake.
    HandshakeS2C = 3,
    /// Application payloads may flow.
    Running = 4,
    /// Wire-only marker for a peer that gave up.
    Failed = 0xFF,
}

impl ConnectionState {
    pub fn name(self) -> &'static str {
        match self {
            ConnectionState::None => "NONE",
            ConnectionState::HandshakeC2S => "HANDSHAKE_C2S",
            ConnectionState::HandshakeS2C => "HANDSHAKE_S2C",
            ConnectionState::Running => "RUNNING",
            ConnectionState::Failed => "FAILED",
        }
    }

    /// True while a handshake is outstanding.
    pub fn is_handshaking(self) -> bool {
        matches!(
            self,
            ConnectionState::HandshakeC2S | ConnectionState::HandshakeS2C
        )
    }
}

impl TryFrom<u8> for ConnectionState {
    type Error = WireError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(ConnectionState::None),
            2 => Ok(ConnectionState::HandshakeC2S),
            3 => Ok(ConnectionState::HandshakeS2C),
            4 => Ok(ConnectionState::Running),
            0xFF => Ok(ConnectionState::Failed),
            other => Err(WireError::InvalidField {
                field: "state",
                value: other,
            }),
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which end of the conversation an endpoint is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Side {
    Server,
    Client,
}

/// Server implementations that speak HCN.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[repr(u8)]
pub enum ServerKind {
    Sapp = 1,
    Phasor = 2,
    Hse = 3,
}

impl TryFrom<u8> for ServerKind {
    type Error = WireError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(ServerKind::Sapp),
            2 => Ok(ServerKind::Phasor),
            3 => Ok(ServerKind::Hse),
            other => Err(WireError::InvalidField {
                field: "server kind",
                value: other,
            }),
        }
    }
}

/// Client add-ons that speak HCN.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[repr(u8)]
pub enum ClientKind {
    Hac2 = 1,
    Chimera = 2,
}

impl TryFrom<u8> for ClientKind {
    type Error = WireError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(ClientKind::Hac2),
            2 => Ok(ClientKind::Chimera),
            other => Err(WireError::InvalidField {
                field: "client kind",
                value: other,
            }),
        }
    }
}

/// Concrete identity an endpoint presents in its handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum PeerRole {
    Server(ServerKind),
    Client(ClientKind),
}

impl PeerRole {
    pub fn side(self) -> Side {
        match self {
            PeerRole::Server(_) => Side::Server,
            PeerRole::Client(_) => Side::Client,
        }
    }

    /// The role byte as carried in a handshake.
    pub fn kind_byte(self) -> u8 {
        match self {
            PeerRole::Server(kind) => kind as u8,
            PeerRole::Client(kind) => kind as u8,
        }
    }

    /// Interpret a handshake role byte according to the handshake direction.
    ///
    /// Only a server-to-client handshake carries a server kind.
    pub fn from_handshake(state: ConnectionState, kind: u8) -> Result<Self, WireError> {
        match state {
            ConnectionState::HandshakeS2C => ServerKind::try_from(kind).map(PeerRole::Server),
            _ => ClientKind::try_from(kind).map(PeerRole::Client),
        }
    }
}

impl fmt::Display for PeerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PeerRole::Server(ServerKind::Sapp) => "SAPP",
            PeerRole::Server(ServerKind::Phasor) => "PHASOR",
            PeerRole::Server(ServerKind::Hse) => "HSE",
            PeerRole::Client(ClientKind::Hac2) => "HAC2",
            PeerRole::Client(ClientKind::Chimera) => "CHIMERA",
        };
        f.write_str(name)
    }
}
