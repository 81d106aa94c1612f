use clap::{Args, Subcommand};

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod decode;
pub mod demo;
pub mod encode;
pub mod keyvalue;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Escape a raw payload into chat-line units.
    Encode(EncodeArgs),
    /// Decode chat-line units and describe the packet.
    Decode(DecodeArgs),
    /// Build the encoded packet for a key/value pair.
    Keyvalue(KeyValueArgs),
    /// Run an in-memory client/server exchange.
    Demo(DemoArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Encode(args) => encode::run(args, format),
        Command::Decode(args) => decode::run(args, format),
        Command::Keyvalue(args) => keyvalue::run(args, format),
        Command::Demo(args) => demo::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    /// ASCII payload.
    #[arg(long, conflicts_with = "hex", required_unless_present = "hex")]
    pub data: Option<String>,
    /// Hex payload bytes (e.g. 201F0205).
    #[arg(long, conflicts_with = "data")]
    pub hex: Option<String>,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Hex 16-bit units (e.g. 1F20 0C02). A trailing 0000 terminator is optional.
    #[arg(required = true, num_args = 1..)]
    pub units: Vec<String>,
}

#[derive(Args, Debug)]
pub struct KeyValueArgs {
    /// Pair in key=value form.
    pub pair: String,
}

#[derive(Args, Debug)]
pub struct DemoArgs {
    /// Slot the server assigns to the demo client.
    #[arg(long, default_value = "1")]
    pub slot: u8,
    /// Key/value pair the client sends once running.
    #[arg(long, default_value = "SJ=ON")]
    pub send: String,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Parse hex units, accepting an optional `0x` prefix.
pub fn parse_units(raw: &[String]) -> CliResult<Vec<u16>> {
    raw.iter()
        .map(|text| {
            let digits = text
                .strip_prefix("0x")
                .or_else(|| text.strip_prefix("0X"))
                .unwrap_or(text);
            u16::from_str_radix(digits, 16)
                .map_err(|err| CliError::new(USAGE, format!("invalid unit '{text}': {err}")))
        })
        .collect()
}

/// Parse a hex byte string. Whitespace between bytes is ignored.
pub fn parse_hex_bytes(raw: &str) -> CliResult<Vec<u8>> {
    let digits: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    if !digits.is_ascii() {
        return Err(CliError::new(USAGE, "hex payload must be ASCII"));
    }
    if digits.len() % 2 != 0 {
        return Err(CliError::new(USAGE, "hex payload has an odd number of digits"));
    }
    (0..digits.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&digits[i..i + 2], 16)
                .map_err(|err| CliError::new(USAGE, format!("invalid hex byte: {err}")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_units_with_and_without_prefix() {
        let raw = vec!["1F20".to_string(), "0xffff".to_string(), "0".to_string()];
        assert_eq!(parse_units(&raw).unwrap(), vec![0x1F20, 0xFFFF, 0]);
        assert!(parse_units(&["xyz".to_string()]).is_err());
        assert!(parse_units(&["10000".to_string()]).is_err());
    }

    #[test]
    fn parses_hex_bytes() {
        assert_eq!(parse_hex_bytes("20 1f 00").unwrap(), vec![0x20, 0x1F, 0x00]);
        assert_eq!(parse_hex_bytes("abc").unwrap_err().code, USAGE);
        assert!(parse_hex_bytes("zz").is_err());
        assert!(parse_hex_bytes("\u{e9}1").is_err());
    }
}
