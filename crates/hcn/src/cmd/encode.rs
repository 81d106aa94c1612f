use hcn_wire::{encode, MAX_PACKET_LENGTH};

use crate::cmd::{parse_hex_bytes, EncodeArgs};
use crate::exit::{CliError, CliResult, DATA_INVALID, SUCCESS, USAGE};
use crate::output::{hex_units, print_report, OutputFormat, Report};

pub fn run(args: EncodeArgs, format: OutputFormat) -> CliResult<i32> {
    let payload = match (args.data, args.hex) {
        (Some(data), None) => data.into_bytes(),
        (None, Some(hex)) => parse_hex_bytes(&hex)?,
        _ => return Err(CliError::new(USAGE, "pass exactly one of --data or --hex")),
    };

    // The codec would silently truncate; refuse instead.
    if payload.len() > MAX_PACKET_LENGTH {
        return Err(CliError::new(
            DATA_INVALID,
            format!(
                "payload too large ({} bytes, max {MAX_PACKET_LENGTH})",
                payload.len()
            ),
        ));
    }

    let units = encode(&payload);
    let report = Report::new()
        .field("payload_len", payload.len())
        .field("encoded_len", units.len() - 1)
        .field("units", hex_units(&units));
    print_report(&report, format);
    Ok(SUCCESS)
}
