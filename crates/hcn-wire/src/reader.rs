use bytes::Buf;
use tracing::trace;

use crate::codec::{decode, line_len, MAGIC};
use crate::error::{Result, WireError};
use crate::kinds::{ConnectionState, PacketType, PeerRole};
use crate::packet::{
    Datapoint, DatapointBatch, DatapointValue, Handshake, KeyValue, Packet, Preamble, TextBatch,
    TextPayload, TextType, Vec3, VectorBatch, VectorEntry, DATAPOINT_SIZE, KEYVALUE_LENGTH,
    MAX_DATAPOINTS, MAX_TEXT_BYTES, MAX_VECTORS, PREAMBLE_SIZE, VECTOR_ENTRY_SIZE, VERSION_LENGTH,
};

/// A declared length that disagrees with the data actually received.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LengthMismatch {
    pub field: &'static str,
    pub declared: usize,
    pub actual: usize,
}

impl From<LengthMismatch> for WireError {
    fn from(mismatch: LengthMismatch) -> Self {
        WireError::LengthMismatch {
            field: mismatch.field,
            declared: mismatch.declared,
            actual: mismatch.actual,
        }
    }
}

/// A decoded packet together with every length inconsistency seen on the way.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundPacket {
    pub preamble: Preamble,
    pub packet: Packet,
    pub mismatches: Vec<LengthMismatch>,
}

impl InboundPacket {
    pub fn is_consistent(&self) -> bool {
        self.mismatches.is_empty()
    }
}

/// Unescape and parse a chat line.
///
/// The magic is checked on the raw line first, so ordinary chat is rejected
/// with [`WireError::InvalidMagic`] without being run through the codec.
pub fn decode_packet(encoded: &[u16]) -> Result<InboundPacket> {
    match encoded.first() {
        Some(&MAGIC) => {}
        Some(&found) => return Err(WireError::InvalidMagic { found }),
        None => {
            return Err(WireError::Truncated {
                needed: 1,
                available: 0,
            })
        }
    }

    let unit_count = line_len(encoded);
    let bytes = decode(encoded, unit_count)?;
    let mut inbound = read_packet(&bytes)?;

    let declared = usize::from(inbound.preamble.encoded_len);
    if declared != unit_count {
        inbound.mismatches.push(LengthMismatch {
            field: "encoded",
            declared,
            actual: unit_count,
        });
    }

    trace!(
        packet_type = %inbound.preamble.packet_type,
        units = unit_count,
        mismatches = inbound.mismatches.len(),
        "decoded packet"
    );
    Ok(inbound)
}

/// Parse an unencoded packet.
///
/// The fixed-size prefix of every variant is validated before any
/// variable-length data is trusted. Disagreements between declared and
/// actual lengths are collected rather than treated as errors.
pub fn read_packet(bytes: &[u8]) -> Result<InboundPacket> {
    need(bytes, PREAMBLE_SIZE)?;

    let mut src = bytes;
    let magic = src.get_u16_le();
    if magic != MAGIC {
        return Err(WireError::InvalidMagic { found: magic });
    }
    let packet_type = PacketType::try_from(src.get_u8())?;
    let payload_len = src.get_u8();
    let encoded_len = src.get_u8();

    let preamble = Preamble {
        magic,
        packet_type,
        payload_len,
        encoded_len,
    };
    let mut mismatches = Vec::new();

    // The codec pads to whole units, so one spare byte is expected for odd
    // lengths. Any other disagreement keeps every received byte.
    let declared = usize::from(payload_len);
    let padded = declared >= PREAMBLE_SIZE && bytes.len().checked_sub(declared) == Some(1);
    let body_end = if padded { declared } else { bytes.len() };
    if declared != bytes.len() && !padded {
        mismatches.push(LengthMismatch {
            field: "payload",
            declared,
            actual: bytes.len(),
        });
    }

    let body = &bytes[PREAMBLE_SIZE..body_end];
    let packet = match packet_type {
        PacketType::Handshake => Packet::Handshake(read_handshake(body)?),
        PacketType::KeyValue => Packet::KeyValue(read_key_value(body, &mut mismatches)?),
        PacketType::Datapoint => Packet::Datapoints(read_datapoints(body, &mut mismatches)?),
        PacketType::Vector => Packet::Vectors(read_vectors(body, &mut mismatches)?),
        PacketType::Text => Packet::Text(read_text(body, &mut mismatches)?),
    };

    Ok(InboundPacket {
        preamble,
        packet,
        mismatches,
    })
}

fn read_handshake(mut body: &[u8]) -> Result<Handshake> {
    need_body(body, Handshake::CORE_SIZE)?;
    let state = ConnectionState::try_from(body.get_u8())?;
    let role = PeerRole::from_handshake(state, body.get_u8())?;
    let version = read_c_string(body, VERSION_LENGTH);
    Ok(Handshake {
        state,
        role,
        version,
    })
}

fn read_key_value(mut body: &[u8], mismatches: &mut Vec<LengthMismatch>) -> Result<KeyValue> {
    need_body(body, KeyValue::CORE_SIZE)?;
    let declared = usize::from(body.get_u8());
    let text = read_c_string(body, KEYVALUE_LENGTH);
    if text.len() != declared {
        mismatches.push(LengthMismatch {
            field: "keyvalue",
            declared,
            actual: text.len(),
        });
    }
    Ok(KeyValue { text })
}

fn read_datapoints(
    mut body: &[u8],
    mismatches: &mut Vec<LengthMismatch>,
) -> Result<DatapointBatch> {
    need_body(body, DatapointBatch::CORE_SIZE)?;
    let count = read_count(&mut body, "datapoint", MAX_DATAPOINTS, DATAPOINT_SIZE, mismatches)?;

    let mut entries = Vec::with_capacity(count);
    for _ in 0..count {
        let kind = body.get_u8();
        let mut value = [0u8; 4];
        body.copy_to_slice(&mut value);
        entries.push(Datapoint::new(kind, DatapointValue::from_bytes(value)));
    }
    Ok(DatapointBatch { entries })
}

fn read_vectors(mut body: &[u8], mismatches: &mut Vec<LengthMismatch>) -> Result<VectorBatch> {
    need_body(body, VectorBatch::CORE_SIZE)?;
    let count = read_count(&mut body, "vector", MAX_VECTORS, VECTOR_ENTRY_SIZE, mismatches)?;

    let mut entries = Vec::with_capacity(count);
    for _ in 0..count {
        let kind = body.get_u8();
        let vector = Vec3::new(body.get_f32_le(), body.get_f32_le(), body.get_f32_le());
        entries.push(VectorEntry::new(kind, vector));
    }
    Ok(VectorBatch { entries })
}

fn read_text(mut body: &[u8], mismatches: &mut Vec<LengthMismatch>) -> Result<TextBatch> {
    need_body(body, TextBatch::CORE_SIZE)?;
    let text_type = TextType(body.get_u8());
    let color = body.get_u8();
    let declared = usize::from(body.get_u8());

    let available = body.len().min(MAX_TEXT_BYTES);
    let char_size = if text_type.is_wide() { 2 } else { 1 };
    let actual = available / char_size;
    if declared != actual {
        mismatches.push(LengthMismatch {
            field: "text",
            declared,
            actual,
        });
    }

    let chars = declared.min(actual);
    let text = if text_type.is_wide() {
        TextPayload::Wide((0..chars).map(|_| body.get_u16_le()).collect())
    } else {
        TextPayload::Narrow(body[..chars].to_vec())
    };

    Ok(TextBatch {
        text_type,
        color,
        text,
    })
}

/// Read a batch count and clamp it to the entries actually present.
fn read_count(
    body: &mut &[u8],
    kind: &'static str,
    max: usize,
    entry_size: usize,
    mismatches: &mut Vec<LengthMismatch>,
) -> Result<usize> {
    let declared = usize::from(body.get_u8());
    if declared > max {
        return Err(WireError::CapacityExceeded {
            kind,
            count: declared,
            max,
        });
    }

    let available = body.len() / entry_size;
    if declared != available {
        mismatches.push(LengthMismatch {
            field: kind,
            declared,
            actual: available,
        });
    }
    Ok(declared.min(available))
}

/// Bytes up to the first zero (or the bound, terminator excluded).
fn read_c_string(body: &[u8], bound: usize) -> String {
    let limit = body.len().min(bound - 1);
    let end = body[..limit]
        .iter()
        .position(|&byte| byte == 0)
        .unwrap_or(limit);
    String::from_utf8_lossy(&body[..end]).into_owned()
}

fn need(bytes: &[u8], needed: usize) -> Result<()> {
    if bytes.len() < needed {
        return Err(WireError::Truncated {
            needed,
            available: bytes.len(),
        });
    }
    Ok(())
}

/// Check the fixed prefix of a variant; `core_size` includes the preamble.
fn need_body(body: &[u8], core_size: usize) -> Result<()> {
    need(body, core_size - PREAMBLE_SIZE)
}
