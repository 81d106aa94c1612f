//! Outbound chat-line transport abstraction.
//!
//! HCN never owns the chat channel. The host engine delivers inbound lines by
//! calling into a session, and the session hands outbound lines back through
//! the [`Transport`] trait defined here:
//! - Any `FnMut(PeerIndex, &[u16])` closure is a transport
//! - [`MemoryTransport`] records lines for tests, demos and loopback wiring
//!
//! This is the lowest stateful layer of hcn. Sessions build on top of it.

pub mod error;
pub mod memory;
pub mod traits;

pub use error::{Result, TransportError};
pub use memory::{ChatLine, MemoryTransport};
pub use traits::Transport;
