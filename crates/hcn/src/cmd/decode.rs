use hcn_wire::{decode_packet, line_len, InboundPacket, Packet, TextPayload};
use serde_json::{json, Value};

use crate::cmd::{parse_units, DecodeArgs};
use crate::exit::{wire_error, CliResult, DATA_INVALID, SUCCESS};
use crate::output::{print_report, OutputFormat, Report};

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let mut units = parse_units(&args.units)?;
    if units.last() != Some(&0) {
        units.push(0);
    }

    let inbound = decode_packet(&units).map_err(|err| wire_error("decode", err))?;
    print_report(&describe(&inbound, line_len(&units)), format);

    if inbound.is_consistent() {
        Ok(SUCCESS)
    } else {
        Ok(DATA_INVALID)
    }
}

fn describe(inbound: &InboundPacket, units: usize) -> Report {
    let mismatches: Vec<String> = inbound
        .mismatches
        .iter()
        .map(|m| format!("{} declared {} actual {}", m.field, m.declared, m.actual))
        .collect();

    let report = Report::new()
        .field("type", inbound.preamble.packet_type.to_string())
        .field("payload_len", inbound.preamble.payload_len)
        .field("encoded_len", inbound.preamble.encoded_len)
        .field("units", units)
        .field("mismatches", mismatches);

    match &inbound.packet {
        Packet::Handshake(hs) => report
            .field("state", hs.state.to_string())
            .field("role", hs.role.to_string())
            .field("version", hs.version.as_str()),
        Packet::KeyValue(kv) => report.field("text", kv.text.as_str()),
        Packet::Datapoints(batch) => {
            let entries: Vec<Value> = batch
                .entries
                .iter()
                .map(|entry| {
                    json!({
                        "type": entry.kind,
                        "i32": entry.value.as_i32(),
                        "f32": entry.value.as_f32(),
                    })
                })
                .collect();
            report.field("entries", entries)
        }
        Packet::Vectors(batch) => {
            let entries: Vec<Value> = batch
                .entries
                .iter()
                .map(|entry| {
                    json!({
                        "type": entry.kind,
                        "x": entry.vector.x,
                        "y": entry.vector.y,
                        "z": entry.vector.z,
                    })
                })
                .collect();
            report.field("entries", entries)
        }
        Packet::Text(text) => report
            .field("text_type", text.text_type.0)
            .field("color", text.color)
            .field(
                "encoding",
                match text.text {
                    TextPayload::Wide(_) => "wide",
                    TextPayload::Narrow(_) => "narrow",
                },
            )
            .field("text", text.text.to_string_lossy()),
    }
}
