//! Zero-free 16-bit escaping and packet layouts for chat-channel messaging.
//!
//! HCN packets ride inside ordinary chat lines, which the host measures by
//! searching for a zero 16-bit unit. Every packet is therefore:
//! - A 5-byte preamble with the 0x1F20 magic, packet type and both lengths
//! - A fixed-layout body per packet type (handshake, key/value, datapoints,
//!   vectors, text)
//! - Reinterpreted as little-endian 16-bit units, with zero and the escape
//!   sentinel escaped, and terminated by a single zero unit
//!
//! This crate does no I/O and keeps no state.

pub mod codec;
pub mod error;
pub mod index;
pub mod kinds;
pub mod packet;
pub mod reader;
pub mod writer;

pub use codec::{
    decode, decode_line, encode, encode_into, escaped_len, is_hcn_line, line_len, CHAT_TYPE,
    ESCAPE, ESCAPE_ESCAPE, ESCAPE_ZERO, MAGIC, MAX_ENCODED_UNITS, MAX_PACKET_LENGTH,
    MAX_PACKET_UNITS,
};
pub use error::{Result, WireError};
pub use index::{PeerIndex, MAX_PEERS};
pub use kinds::{ClientKind, ConnectionState, PacketType, PeerRole, ServerKind, Side};
pub use packet::{
    Datapoint, DatapointBatch, DatapointValue, Handshake, KeyValue, Packet, Preamble, TextBatch,
    TextPayload, TextType, Vec3, VectorBatch, VectorEntry, KEYVALUE_LENGTH, KEY_LENGTH,
    MAX_DATAPOINTS, MAX_TEXT_BYTES, MAX_VECTORS, PREAMBLE_SIZE, VALUE_LENGTH, VERSION_LENGTH,
    WIDE_TEXT_FLAG,
};
pub use reader::{decode_packet, read_packet, InboundPacket, LengthMismatch};
pub use writer::{encode_packet, write_packet};
