use hcn_dispatch::parse_key_value;
use hcn_wire::{encode_packet, KeyValue, Packet};

use crate::cmd::KeyValueArgs;
use crate::exit::{dispatch_error, wire_error, CliResult, SUCCESS};
use crate::output::{hex_units, print_report, OutputFormat, Report};

pub fn run(args: KeyValueArgs, format: OutputFormat) -> CliResult<i32> {
    let pair = parse_key_value(&args.pair).map_err(|err| dispatch_error("keyvalue", err))?;
    pair.validate()
        .map_err(|err| dispatch_error("keyvalue", err))?;

    let packet = Packet::from(KeyValue::new(args.pair.as_str()));
    let units = encode_packet(&packet).map_err(|err| wire_error("encode", err))?;

    let report = Report::new()
        .field("key", pair.key)
        .field("value", pair.value)
        .field("payload_len", packet.wire_len())
        .field("encoded_len", units.len() - 1)
        .field("units", hex_units(&units));
    print_report(&report, format);
    Ok(SUCCESS)
}
