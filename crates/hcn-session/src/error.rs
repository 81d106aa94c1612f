use hcn_dispatch::DispatchError;
use hcn_transport::TransportError;
use hcn_wire::{ConnectionState, PeerIndex, WireError};

/// Errors that can occur in session operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// Packet-level error.
    #[error("wire error: {0}")]
    Wire(#[from] WireError),

    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Dispatch-level error.
    #[error("dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    /// The line arrived on a chat category other than the configured one.
    #[error("chat type {chat_type} is not the HCN channel")]
    TypeMismatch { chat_type: u32 },

    /// A handshake carried a state byte outside the protocol. The slot was reset.
    #[error("unexpected handshake state {state} on slot {slot}")]
    UnexpectedHandshakeState { slot: PeerIndex, state: u8 },

    /// Application payloads need a running slot.
    #[error("slot {slot} is not running (state {state})")]
    NotRunning {
        slot: PeerIndex,
        state: ConnectionState,
    },

    /// The operation belongs to the other side of the conversation.
    #[error("operation not available to a {0}")]
    WrongSide(&'static str),

    /// Session configuration failed validation.
    #[error("invalid session config: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, SessionError>;
