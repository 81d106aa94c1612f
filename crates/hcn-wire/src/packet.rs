//! Packet layouts.
//!
//! Every packet is a little-endian, byte-packed record that starts with a
//! [`Preamble`]:
//!
//! ```text
//! ┌──────────────┬──────────┬─────────────┬─────────────┬──────────────────┐
//! │ Magic (2B)   │ Type     │ Payload len │ Encoded len │ Variant fields   │
//! │ 0x20 0x1F    │ (1B)     │ (1B, bytes) │ (1B, units) │                  │
//! └──────────────┴──────────┴─────────────┴─────────────┴──────────────────┘
//! ```

use crate::codec::MAGIC;
use crate::error::{Result, WireError};
use crate::kinds::{ConnectionState, PacketType, PeerRole};

/// Size of the preamble in bytes.
pub const PREAMBLE_SIZE: usize = 5;

/// Key bound, including the terminator.
pub const KEY_LENGTH: usize = 30;

/// Value bound, including the terminator.
pub const VALUE_LENGTH: usize = 128;

/// `key=value` bound, including the terminator.
pub const KEYVALUE_LENGTH: usize = KEY_LENGTH + VALUE_LENGTH + 1;

/// Version string bound, including the terminator.
pub const VERSION_LENGTH: usize = 128;

/// Entries per datapoint batch.
pub const MAX_DATAPOINTS: usize = 6;

/// Entries per vector batch.
pub const MAX_VECTORS: usize = 4;

/// Text buffer bound in bytes (120 wide or 240 narrow characters).
pub const MAX_TEXT_BYTES: usize = 240;

/// Text types with this bit set carry wide (UTF-16LE) characters.
pub const WIDE_TEXT_FLAG: u8 = 0x80;

/// Wire size of one datapoint entry: type + 4-byte value.
pub const DATAPOINT_SIZE: usize = 5;

/// Wire size of one vector entry: type + three `f32`.
pub const VECTOR_ENTRY_SIZE: usize = 13;

/// Common header of every packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Preamble {
    /// Always [`MAGIC`] for a well-formed packet.
    pub magic: u16,
    pub packet_type: PacketType,
    /// Unencoded record length in bytes, preamble included.
    pub payload_len: u8,
    /// Escaped length in 16-bit units, terminator excluded.
    pub encoded_len: u8,
}

impl Preamble {
    /// A preamble with the magic set and both lengths still unstamped.
    pub fn new(packet_type: PacketType) -> Self {
        Self {
            magic: MAGIC,
            packet_type,
            payload_len: 0,
            encoded_len: 0,
        }
    }
}

/// Handshake, exchanged once per direction to bring a slot to running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    /// Intended state of the connection: `HANDSHAKE_C2S` from a client,
    /// `HANDSHAKE_S2C` in a server's reply.
    pub state: ConnectionState,
    /// Sender identity. Travels as a client kind or server kind byte
    /// depending on `state`.
    pub role: PeerRole,
    pub version: String,
}

impl Handshake {
    pub const CORE_SIZE: usize = PREAMBLE_SIZE + 2;

    pub fn new(state: ConnectionState, role: PeerRole, version: impl Into<String>) -> Self {
        Self {
            state,
            role,
            version: version.into(),
        }
    }

    /// Exact unencoded length, version terminator included.
    pub fn wire_len(&self) -> usize {
        Self::CORE_SIZE + self.version.len() + 1
    }

    fn validate(&self) -> Result<()> {
        check_c_string("version", &self.version, VERSION_LENGTH)?;
        let kind = self.role.kind_byte();
        if PeerRole::from_handshake(self.state, kind).ok() != Some(self.role) {
            return Err(WireError::InvalidField { field: "role", value: kind });
        }
        Ok(())
    }
}

/// An ASCII `key=value` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyValue {
    pub text: String,
}

impl KeyValue {
    pub const CORE_SIZE: usize = PREAMBLE_SIZE + 1;

    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn wire_len(&self) -> usize {
        Self::CORE_SIZE + self.text.len() + 1
    }

    fn validate(&self) -> Result<()> {
        if let Some(byte) = self.text.bytes().find(|byte| !byte.is_ascii()) {
            return Err(WireError::InvalidField {
                field: "keyvalue",
                value: byte,
            });
        }
        check_c_string("keyvalue", &self.text, KEYVALUE_LENGTH)
    }
}

/// Four raw bytes interpreted by the receiver according to the entry type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DatapointValue([u8; 4]);

impl DatapointValue {
    pub fn from_bytes(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }

    pub fn from_i32(value: i32) -> Self {
        Self(value.to_le_bytes())
    }

    pub fn from_u32(value: u32) -> Self {
        Self(value.to_le_bytes())
    }

    pub fn from_f32(value: f32) -> Self {
        Self(value.to_le_bytes())
    }

    pub fn to_bytes(self) -> [u8; 4] {
        self.0
    }

    pub fn as_i32(self) -> i32 {
        i32::from_le_bytes(self.0)
    }

    pub fn as_u32(self) -> u32 {
        u32::from_le_bytes(self.0)
    }

    pub fn as_f32(self) -> f32 {
        f32::from_le_bytes(self.0)
    }
}

/// One typed numeric entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Datapoint {
    /// Application-defined type. Zero is never valid.
    pub kind: u8,
    pub value: DatapointValue,
}

impl Datapoint {
    pub fn new(kind: u8, value: DatapointValue) -> Self {
        Self { kind, value }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DatapointBatch {
    pub entries: Vec<Datapoint>,
}

impl DatapointBatch {
    pub const CORE_SIZE: usize = PREAMBLE_SIZE + 1;

    pub fn new(entries: Vec<Datapoint>) -> Self {
        Self { entries }
    }

    pub fn wire_len(&self) -> usize {
        Self::CORE_SIZE + self.entries.len() * DATAPOINT_SIZE
    }

    fn validate(&self) -> Result<()> {
        check_capacity("datapoint", self.entries.len(), MAX_DATAPOINTS)?;
        for entry in &self.entries {
            check_entry_type("datapoint type", entry.kind)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// One typed vector entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VectorEntry {
    /// Application-defined type. Zero is never valid.
    pub kind: u8,
    pub vector: Vec3,
}

impl VectorEntry {
    pub fn new(kind: u8, vector: Vec3) -> Self {
        Self { kind, vector }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct VectorBatch {
    pub entries: Vec<VectorEntry>,
}

impl VectorBatch {
    pub const CORE_SIZE: usize = PREAMBLE_SIZE + 1;

    pub fn new(entries: Vec<VectorEntry>) -> Self {
        Self { entries }
    }

    pub fn wire_len(&self) -> usize {
        Self::CORE_SIZE + self.entries.len() * VECTOR_ENTRY_SIZE
    }

    fn validate(&self) -> Result<()> {
        check_capacity("vector", self.entries.len(), MAX_VECTORS)?;
        for entry in &self.entries {
            check_entry_type("vector type", entry.kind)?;
        }
        Ok(())
    }
}

/// Text category. The high bit selects wide characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextType(pub u8);

impl TextType {
    pub fn is_wide(self) -> bool {
        self.0 & WIDE_TEXT_FLAG != 0
    }
}

/// Text characters, wide or narrow depending on the category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextPayload {
    Wide(Vec<u16>),
    Narrow(Vec<u8>),
}

impl TextPayload {
    /// Length in characters, as carried in `text_len`.
    pub fn char_len(&self) -> usize {
        match self {
            TextPayload::Wide(units) => units.len(),
            TextPayload::Narrow(bytes) => bytes.len(),
        }
    }

    pub fn byte_len(&self) -> usize {
        match self {
            TextPayload::Wide(units) => units.len() * 2,
            TextPayload::Narrow(bytes) => bytes.len(),
        }
    }

    pub fn is_wide(&self) -> bool {
        matches!(self, TextPayload::Wide(_))
    }

    /// Lossy conversion for display and logging.
    pub fn to_string_lossy(&self) -> String {
        match self {
            TextPayload::Wide(units) => String::from_utf16_lossy(units),
            TextPayload::Narrow(bytes) => String::from_utf8_lossy(bytes).into_owned(),
        }
    }
}

/// A categorized, colored text line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextBatch {
    pub text_type: TextType,
    pub color: u8,
    pub text: TextPayload,
}

impl TextBatch {
    pub const CORE_SIZE: usize = PREAMBLE_SIZE + 3;

    /// Build a text batch, picking wide or narrow storage from the category.
    pub fn new(text_type: TextType, color: u8, text: &str) -> Self {
        let text = if text_type.is_wide() {
            TextPayload::Wide(text.encode_utf16().collect())
        } else {
            TextPayload::Narrow(text.as_bytes().to_vec())
        };
        Self {
            text_type,
            color,
            text,
        }
    }

    pub fn wire_len(&self) -> usize {
        Self::CORE_SIZE + self.text.byte_len()
    }

    fn validate(&self) -> Result<()> {
        check_entry_type("text type", self.text_type.0)?;
        if self.text_type.is_wide() != self.text.is_wide() {
            return Err(WireError::InvalidField {
                field: "text type",
                value: self.text_type.0,
            });
        }
        let len = self.text.byte_len();
        if len > MAX_TEXT_BYTES {
            return Err(WireError::FieldTooLong {
                field: "text",
                len,
                max: MAX_TEXT_BYTES,
            });
        }
        Ok(())
    }
}

/// Any packet, tagged by variant.
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    Handshake(Handshake),
    KeyValue(KeyValue),
    Datapoints(DatapointBatch),
    Vectors(VectorBatch),
    Text(TextBatch),
}

impl Packet {
    pub fn packet_type(&self) -> PacketType {
        match self {
            Packet::Handshake(_) => PacketType::Handshake,
            Packet::KeyValue(_) => PacketType::KeyValue,
            Packet::Datapoints(_) => PacketType::Datapoint,
            Packet::Vectors(_) => PacketType::Vector,
            Packet::Text(_) => PacketType::Text,
        }
    }

    /// Size of the fixed-length prefix, excluding trailing variable data.
    pub fn core_size(&self) -> usize {
        match self {
            Packet::Handshake(_) => Handshake::CORE_SIZE,
            Packet::KeyValue(_) => KeyValue::CORE_SIZE,
            Packet::Datapoints(_) => DatapointBatch::CORE_SIZE,
            Packet::Vectors(_) => VectorBatch::CORE_SIZE,
            Packet::Text(_) => TextBatch::CORE_SIZE,
        }
    }

    /// Exact unencoded length in bytes.
    pub fn wire_len(&self) -> usize {
        match self {
            Packet::Handshake(p) => p.wire_len(),
            Packet::KeyValue(p) => p.wire_len(),
            Packet::Datapoints(p) => p.wire_len(),
            Packet::Vectors(p) => p.wire_len(),
            Packet::Text(p) => p.wire_len(),
        }
    }

    /// Check bounds, capacities and field values without writing anything.
    pub fn validate(&self) -> Result<()> {
        match self {
            Packet::Handshake(p) => p.validate(),
            Packet::KeyValue(p) => p.validate(),
            Packet::Datapoints(p) => p.validate(),
            Packet::Vectors(p) => p.validate(),
            Packet::Text(p) => p.validate(),
        }
    }
}

impl From<Handshake> for Packet {
    fn from(packet: Handshake) -> Self {
        Packet::Handshake(packet)
    }
}

impl From<KeyValue> for Packet {
    fn from(packet: KeyValue) -> Self {
        Packet::KeyValue(packet)
    }
}

impl From<DatapointBatch> for Packet {
    fn from(packet: DatapointBatch) -> Self {
        Packet::Datapoints(packet)
    }
}

impl From<VectorBatch> for Packet {
    fn from(packet: VectorBatch) -> Self {
        Packet::Vectors(packet)
    }
}

impl From<TextBatch> for Packet {
    fn from(packet: TextBatch) -> Self {
        Packet::Text(packet)
    }
}

fn check_c_string(field: &'static str, value: &str, bound: usize) -> Result<()> {
    if value.as_bytes().contains(&0) {
        return Err(WireError::InvalidField { field, value: 0 });
    }
    // The bound includes the terminator.
    if value.len() >= bound {
        return Err(WireError::FieldTooLong {
            field,
            len: value.len(),
            max: bound - 1,
        });
    }
    Ok(())
}

fn check_capacity(kind: &'static str, count: usize, max: usize) -> Result<()> {
    if count > max {
        return Err(WireError::CapacityExceeded { kind, count, max });
    }
    Ok(())
}

fn check_entry_type(field: &'static str, kind: u8) -> Result<()> {
    if kind == 0 {
        return Err(WireError::InvalidField { field, value: 0 });
    }
    Ok(())
}
