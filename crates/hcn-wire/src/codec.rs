use tracing::warn;

use crate::error::{Result, WireError};

/// First 16-bit unit of every packet (bytes `0x20, 0x1F` on the wire).
pub const MAGIC: u16 = 0x1F20;

/// Chat category HCN lines travel on. Stock clients leave it unused.
pub const CHAT_TYPE: u32 = 6;

/// Escape sentinel. Not a valid UTF-16 character, so real chat never carries it.
pub const ESCAPE: u16 = 0xFFFF;

/// Tag after [`ESCAPE`] standing for a single zero unit.
pub const ESCAPE_ZERO: u16 = 0xFF01;

/// Tag after [`ESCAPE`] standing for a literal [`ESCAPE`] unit.
pub const ESCAPE_ESCAPE: u16 = 0xFFFF;

/// Maximum unencoded packet length in bytes.
pub const MAX_PACKET_LENGTH: usize = 500;

/// Maximum unencoded packet length in 16-bit units.
pub const MAX_PACKET_UNITS: usize = MAX_PACKET_LENGTH / 2;

/// Worst-case encoded length: every unit escaped, plus the terminator.
pub const MAX_ENCODED_UNITS: usize = MAX_PACKET_UNITS * 2 + 1;

/// Escape a payload into a zero-free, zero-terminated unit sequence.
///
/// Bytes are paired little-endian into 16-bit units; an odd trailing byte is
/// padded with zero. Payloads longer than [`MAX_PACKET_LENGTH`] are truncated.
pub fn encode(payload: &[u8]) -> Vec<u16> {
    let mut dst = Vec::new();
    encode_into(payload, &mut dst);
    dst
}

/// Escape a payload, appending to `dst`.
///
/// Returns the number of units written, not counting the terminator.
///
/// ```text
/// 0x0000 -> ESCAPE, ESCAPE_ZERO
/// 0xFFFF -> ESCAPE, ESCAPE_ESCAPE
/// other  -> other
/// ```
pub fn encode_into(payload: &[u8], dst: &mut Vec<u16>) -> usize {
    let payload = clamp(payload);
    let start = dst.len();
    dst.reserve(escaped_len(payload) + 1);

    for unit in units(payload) {
        match unit {
            0 => dst.extend_from_slice(&[ESCAPE, ESCAPE_ZERO]),
            ESCAPE => dst.extend_from_slice(&[ESCAPE, ESCAPE_ESCAPE]),
            other => dst.push(other),
        }
    }

    let written = dst.len() - start;
    dst.push(0);
    written
}

/// Number of units `payload` escapes to, excluding the terminator.
pub fn escaped_len(payload: &[u8]) -> usize {
    units(clamp(payload))
        .map(|unit| if unit == 0 || unit == ESCAPE { 2 } else { 1 })
        .sum()
}

/// Unescape the first `unit_count` units of `encoded`.
///
/// Decoding stops early at a zero unit (the line terminator). The returned
/// byte length is always even; callers holding a declared length trim to it.
/// Output beyond [`MAX_PACKET_LENGTH`] bytes is dropped.
pub fn decode(encoded: &[u16], unit_count: usize) -> Result<Vec<u8>> {
    if unit_count > encoded.len() {
        return Err(WireError::Truncated {
            needed: unit_count,
            available: encoded.len(),
        });
    }

    let input = &encoded[..unit_count];
    let mut out = Vec::with_capacity((unit_count * 2).min(MAX_PACKET_LENGTH));
    let mut pos = 0usize;

    while pos < input.len() {
        let unit = input[pos];
        if unit == 0 {
            break;
        }

        let decoded = if unit == ESCAPE {
            let tag = *input.get(pos + 1).ok_or(WireError::Truncated {
                needed: pos + 2,
                available: input.len(),
            })?;
            let decoded = match tag {
                ESCAPE_ZERO => 0,
                ESCAPE_ESCAPE => ESCAPE,
                tag => return Err(WireError::MalformedEscape { position: pos, tag }),
            };
            pos += 2;
            decoded
        } else {
            pos += 1;
            unit
        };

        if out.len() + 2 > MAX_PACKET_LENGTH {
            warn!(
                max = MAX_PACKET_LENGTH,
                "decoded packet exceeds maximum length, truncating"
            );
            break;
        }
        out.extend_from_slice(&decoded.to_le_bytes());
    }

    Ok(out)
}

/// Unescape a chat line up to its zero terminator (or the end of the slice).
pub fn decode_line(encoded: &[u16]) -> Result<Vec<u8>> {
    decode(encoded, line_len(encoded))
}

/// Length of a chat line in units, excluding the terminator.
pub fn line_len(encoded: &[u16]) -> usize {
    encoded
        .iter()
        .position(|&unit| unit == 0)
        .unwrap_or(encoded.len())
}

/// Quick check whether a chat line is an HCN packet at all.
///
/// True when the line starts with [`MAGIC`] and arrived on [`CHAT_TYPE`].
pub fn is_hcn_line(chat_type: u32, encoded: &[u16]) -> bool {
    chat_type == CHAT_TYPE && encoded.first() == Some(&MAGIC)
}

fn clamp(payload: &[u8]) -> &[u8] {
    if payload.len() > MAX_PACKET_LENGTH {
        warn!(
            len = payload.len(),
            max = MAX_PACKET_LENGTH,
            "payload exceeds maximum packet length, truncating"
        );
        &payload[..MAX_PACKET_LENGTH]
    } else {
        payload
    }
}

fn units(payload: &[u8]) -> impl Iterator<Item = u16> + '_ {
    payload.chunks(2).map(|pair| match *pair {
        [lo, hi] => u16::from_le_bytes([lo, hi]),
        [lo] => u16::from(lo),
        _ => 0,
    })
}
