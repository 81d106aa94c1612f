/// Errors that can occur while escaping, reading, or writing packets.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    /// The first unit is not the protocol magic. Usually ordinary chat.
    #[error("invalid packet magic 0x{found:04X} (expected 0x1F20)")]
    InvalidMagic { found: u16 },

    /// An escape sentinel was followed by an unrecognized tag.
    #[error("malformed escape sequence at unit {position} (tag 0x{tag:04X})")]
    MalformedEscape { position: usize, tag: u16 },

    /// The input ended before a complete field or escape sequence.
    #[error("truncated input ({needed} needed, {available} available)")]
    Truncated { needed: usize, available: usize },

    /// The preamble carries a packet type this crate does not know.
    #[error("unknown packet type {0}")]
    UnknownPacketType(u8),

    /// A fixed field holds a value outside its enumeration.
    #[error("invalid {field} value {value}")]
    InvalidField { field: &'static str, value: u8 },

    /// A string field is longer than its wire bound.
    #[error("{field} too long ({len} bytes, max {max})")]
    FieldTooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },

    /// A batch holds more entries than its packet can carry.
    #[error("too many {kind} entries ({count}, max {max})")]
    CapacityExceeded {
        kind: &'static str,
        count: usize,
        max: usize,
    },

    /// The packet does not fit the preamble's length fields.
    #[error("packet too large ({size}, max {max})")]
    PacketTooLarge { size: usize, max: usize },

    /// A declared length disagrees with what was actually received.
    #[error("{field} length mismatch (declared {declared}, actual {actual})")]
    LengthMismatch {
        field: &'static str,
        declared: usize,
        actual: usize,
    },

    /// Slot indices are limited to the 16 preallocated peers.
    #[error("peer index {0} out of range (max 15)")]
    InvalidPeerIndex(u8),
}

pub type Result<T> = std::result::Result<T, WireError>;
