//! Typed messaging between game add-ons, disguised as ordinary chat lines.
//!
//! hcn lets a client add-on and a server add-on exchange handshakes,
//! key/value pairs, numeric datapoints, vectors and text through a host's
//! existing chat pipeline, which only understands zero-terminated 16-bit
//! strings.
//!
//! # Crate Structure
//!
//! - [`wire`]: Escape codec and packet layouts
//! - [`transport`]: Outbound chat-line transport abstraction
//! - [`dispatch`]: Typed handler registry (behind `session` feature)
//! - [`session`]: Handshake tracking and the session facade (behind `session` feature)

/// Re-export wire types.
pub mod wire {
    pub use hcn_wire::*;
}

/// Re-export transport types.
pub mod transport {
    pub use hcn_transport::*;
}

/// Re-export dispatch types (requires `session` feature).
#[cfg(feature = "session")]
pub mod dispatch {
    pub use hcn_dispatch::*;
}

/// Re-export session types (requires `session` feature).
#[cfg(feature = "session")]
pub mod session {
    pub use hcn_session::*;
}
