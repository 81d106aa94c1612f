use bytes::{BufMut, Bytes, BytesMut};
use tracing::trace;

use crate::codec::{encode, escaped_len, MAGIC};
use crate::error::{Result, WireError};
use crate::packet::{Packet, TextPayload, PREAMBLE_SIZE};

/// Largest value either preamble length field can hold.
const MAX_LENGTH_FIELD: usize = u8::MAX as usize;

/// Offset of `encoded_len` inside the preamble.
const ENCODED_LEN_OFFSET: usize = 4;

/// Serialize a packet into its unencoded byte layout with a stamped preamble.
///
/// The packet is validated first, so capacity and bound violations are
/// reported before any byte is produced.
pub fn write_packet(packet: &Packet) -> Result<Bytes> {
    packet.validate()?;

    let wire_len = packet.wire_len();
    if wire_len > MAX_LENGTH_FIELD {
        return Err(WireError::PacketTooLarge {
            size: wire_len,
            max: MAX_LENGTH_FIELD,
        });
    }

    let mut dst = BytesMut::with_capacity(wire_len + 1);
    dst.put_u16_le(MAGIC);
    dst.put_u8(packet.packet_type() as u8);
    dst.put_u8(wire_len as u8);
    // Nonzero placeholder so the unit holding it is counted as a plain unit.
    dst.put_u8(1);
    write_body(packet, &mut dst);
    debug_assert_eq!(dst.len(), wire_len);

    let encoded_len = escaped_len(&dst);
    if encoded_len > MAX_LENGTH_FIELD {
        return Err(WireError::PacketTooLarge {
            size: encoded_len,
            max: MAX_LENGTH_FIELD,
        });
    }
    dst[ENCODED_LEN_OFFSET] = encoded_len as u8;

    Ok(dst.freeze())
}

/// Serialize and escape a packet into a zero-terminated chat line.
pub fn encode_packet(packet: &Packet) -> Result<Vec<u16>> {
    let bytes = write_packet(packet)?;
    let stamped = usize::from(bytes[ENCODED_LEN_OFFSET]);
    let line = encode(&bytes);

    // Stamping can only grow the count when it turns the unit into 0xFFFF,
    // which happens only past the u8 limit.
    let actual = line.len() - 1;
    if actual != stamped {
        return Err(WireError::PacketTooLarge {
            size: actual,
            max: MAX_LENGTH_FIELD,
        });
    }

    trace!(
        packet_type = %packet.packet_type(),
        payload_len = bytes.len(),
        encoded_len = actual,
        "encoded packet"
    );
    Ok(line)
}

fn write_body(packet: &Packet, dst: &mut BytesMut) {
    debug_assert_eq!(dst.len(), PREAMBLE_SIZE);
    match packet {
        Packet::Handshake(hs) => {
            dst.put_u8(hs.state as u8);
            dst.put_u8(hs.role.kind_byte());
            put_c_string(dst, &hs.version);
        }
        Packet::KeyValue(kv) => {
            dst.put_u8(kv.text.len() as u8);
            put_c_string(dst, &kv.text);
        }
        Packet::Datapoints(batch) => {
            dst.put_u8(batch.entries.len() as u8);
            for entry in &batch.entries {
                dst.put_u8(entry.kind);
                dst.put_slice(&entry.value.to_bytes());
            }
        }
        Packet::Vectors(batch) => {
            dst.put_u8(batch.entries.len() as u8);
            for entry in &batch.entries {
                dst.put_u8(entry.kind);
                dst.put_f32_le(entry.vector.x);
                dst.put_f32_le(entry.vector.y);
                dst.put_f32_le(entry.vector.z);
            }
        }
        Packet::Text(text) => {
            dst.put_u8(text.text_type.0);
            dst.put_u8(text.color);
            dst.put_u8(text.text.char_len() as u8);
            match &text.text {
                TextPayload::Wide(units) => {
                    for unit in units {
                        dst.put_u16_le(*unit);
                    }
                }
                TextPayload::Narrow(bytes) => dst.put_slice(bytes),
            }
        }
    }
}

fn put_c_string(dst: &mut BytesMut, value: &str) {
    dst.put_slice(value.as_bytes());
    dst.put_u8(0);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{decode_line, ESCAPE, ESCAPE_ZERO};
    use crate::kinds::{ClientKind, ConnectionState, PeerRole};
    use crate::packet::{
        Datapoint, DatapointBatch, DatapointValue, Handshake, KeyValue, TextBatch, TextType,
        MAX_DATAPOINTS, MAX_TEXT_BYTES,
    };

    #[test]
    fn write_stamps_preamble() {
        let packet = Packet::from(KeyValue::new("SJ=ON"));
        let bytes = write_packet(&packet).unwrap();

        assert_eq!(&bytes[..2], &[0x20, 0x1F]);
        assert_eq!(bytes[2], 2);
        assert_eq!(usize::from(bytes[3]), packet.wire_len());
        assert_eq!(bytes[5], 5);
        assert_eq!(&bytes[6..11], b"SJ=ON");
        assert_eq!(bytes[11], 0);
    }

    #[test]
    fn encoded_len_matches_line() {
        let packet = Packet::from(Handshake::new(
            ConnectionState::HandshakeC2S,
            PeerRole::Client(ClientKind::Hac2),
            "1.0",
        ));
        let line = encode_packet(&packet).unwrap();
        let bytes = decode_line(&line).unwrap();

        assert_eq!(usize::from(bytes[4]), line.len() - 1);
        assert_eq!(*line.last().unwrap(), 0);
        assert!(!line[..line.len() - 1].contains(&0));
    }

    #[test]
    fn zero_bytes_are_escaped() {
        let batch = DatapointBatch::new(vec![Datapoint::new(1, DatapointValue::from_i32(0))]);
        let line = encode_packet(&Packet::from(batch)).unwrap();
        assert!(line.windows(2).any(|w| w == [ESCAPE, ESCAPE_ZERO]));
    }

    #[test]
    fn capacity_checked_before_encoding() {
        let entries = vec![Datapoint::new(1, DatapointValue::from_i32(1)); MAX_DATAPOINTS + 1];
        let err = encode_packet(&Packet::from(DatapointBatch::new(entries))).unwrap_err();
        assert!(matches!(err, WireError::CapacityExceeded { .. }));
    }

    #[test]
    fn six_datapoints_fit() {
        let entries = vec![Datapoint::new(2, DatapointValue::from_u32(9)); MAX_DATAPOINTS];
        assert!(encode_packet(&Packet::from(DatapointBatch::new(entries))).is_ok());
    }

    #[test]
    fn worst_case_text_fits_length_fields() {
        let text = TextBatch {
            text_type: TextType(0x81),
            color: 1,
            text: TextPayload::Wide(vec![0xFFFF; MAX_TEXT_BYTES / 2]),
        };
        let line = encode_packet(&Packet::from(text)).unwrap();
        let bytes = decode_line(&line).unwrap();

        assert_eq!(usize::from(bytes[3]), TextBatch::CORE_SIZE + MAX_TEXT_BYTES);
        assert_eq!(usize::from(bytes[4]), line.len() - 1);
    }
}
