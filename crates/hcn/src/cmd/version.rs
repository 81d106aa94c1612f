use hcn_wire::{CHAT_TYPE, MAGIC, MAX_PACKET_LENGTH};

use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("hcn {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: hcn");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "target: {}",
        option_env!("HCN_BUILD_TARGET").unwrap_or("unknown")
    );
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!("protocol_magic: 0x{MAGIC:04X}");
    println!("chat_type: {CHAT_TYPE}");
    println!("max_packet_length: {MAX_PACKET_LENGTH}");
    println!("features: session={}, cli=true", cfg!(feature = "session"));

    Ok(SUCCESS)
}
