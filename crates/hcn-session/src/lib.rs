//! Per-slot handshake tracking and the session facade for HCN.
//!
//! This is the "just works" layer. A [`Session`] owns the slot table, shares
//! a handler registry, and sends through a host-supplied transport. The host
//! feeds every chat line it receives into [`Session::process_chat`] and calls
//! the `send_*` methods to talk to peers whose slot is running.

pub mod config;
pub mod error;
pub mod session;
pub mod state;

pub use config::SessionConfig;
pub use error::{Result, SessionError};
pub use session::{Outcome, Session};
pub use state::{PeerHandshake, SessionTable, Slot, Transition};
