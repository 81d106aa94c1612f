use std::sync::{Arc, Mutex};

use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use hcn_dispatch::{parse_key_value, DispatchRegistry};
use hcn_session::{Session, SessionConfig};
use hcn_transport::MemoryTransport;
use hcn_wire::{decode_packet, ClientKind, PeerIndex, ServerKind};
use serde::Serialize;

use crate::cmd::DemoArgs;
use crate::exit::{dispatch_error, session_error, CliError, CliResult, FAILURE, SUCCESS, USAGE};
use crate::output::{hex_units, OutputFormat};

const DEMO_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Serialize)]
struct Step {
    from: &'static str,
    to: &'static str,
    slot: u8,
    packet: String,
    acted: bool,
    units: Vec<String>,
}

#[derive(Serialize)]
struct DemoOutput {
    steps: Vec<Step>,
    client_state: String,
    server_state: String,
    received: Vec<String>,
}

struct Endpoint<'a> {
    name: &'static str,
    session: &'a mut Session<MemoryTransport>,
}

pub fn run(args: DemoArgs, format: OutputFormat) -> CliResult<i32> {
    let client_slot = PeerIndex::new(args.slot)
        .map_err(|err| CliError::new(USAGE, format!("--slot: {err}")))?;
    let key = parse_key_value(&args.send)
        .map_err(|err| dispatch_error("--send", err))?
        .key
        .to_string();

    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&received);
    let mut registry = DispatchRegistry::new();
    registry.on_key(key, move |_: PeerIndex, key: &str, value: &str| {
        if let Ok(mut seen) = sink.lock() {
            seen.push(format!("{key}={value}"));
        }
    });

    let mut server = Session::new(
        SessionConfig::server(ServerKind::Sapp, DEMO_VERSION),
        Arc::new(registry),
        MemoryTransport::new(),
    )
    .map_err(|err| session_error("server", err))?;
    let mut client = Session::new(
        SessionConfig::client(ClientKind::Hac2, DEMO_VERSION),
        Arc::new(DispatchRegistry::new()),
        MemoryTransport::new(),
    )
    .map_err(|err| session_error("client", err))?;

    let mut steps = Vec::new();

    client
        .start_handshake()
        .map_err(|err| session_error("start handshake", err))?;
    relay(
        Endpoint {
            name: "client",
            session: &mut client,
        },
        Endpoint {
            name: "server",
            session: &mut server,
        },
        client_slot,
        &mut steps,
    )?;
    relay(
        Endpoint {
            name: "server",
            session: &mut server,
        },
        Endpoint {
            name: "client",
            session: &mut client,
        },
        PeerIndex::SERVER,
        &mut steps,
    )?;

    client
        .send_key_value(PeerIndex::SERVER, &args.send)
        .map_err(|err| session_error("send", err))?;
    relay(
        Endpoint {
            name: "client",
            session: &mut client,
        },
        Endpoint {
            name: "server",
            session: &mut server,
        },
        client_slot,
        &mut steps,
    )?;

    let received = received
        .lock()
        .map(|seen| seen.clone())
        .unwrap_or_default();
    let out = DemoOutput {
        steps,
        client_state: client.state(PeerIndex::SERVER).to_string(),
        server_state: server.state(client_slot).to_string(),
        received,
    };
    print_demo(&out, format);

    let ok = client.is_running(PeerIndex::SERVER)
        && server.is_running(client_slot)
        && !out.received.is_empty();
    Ok(if ok { SUCCESS } else { FAILURE })
}

/// Deliver every line `from` has queued to `to`, arriving on `slot`.
fn relay(
    mut from: Endpoint<'_>,
    mut to: Endpoint<'_>,
    slot: PeerIndex,
    steps: &mut Vec<Step>,
) -> CliResult<()> {
    for line in from.session.transport_mut().drain() {
        let packet = decode_packet(&line.units)
            .map(|inbound| inbound.packet.packet_type().to_string())
            .unwrap_or_else(|_| "INVALID".to_string());
        let outcome = to
            .session
            .try_process(slot, line.chat_type, &line.units)
            .map_err(|err| session_error(to.name, err))?;

        steps.push(Step {
            from: from.name,
            to: to.name,
            slot: slot.get(),
            packet,
            acted: outcome.acted(),
            units: hex_units(&line.units),
        });
    }
    Ok(())
}

fn print_demo(out: &DemoOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["FROM", "TO", "SLOT", "PACKET", "ACTED", "UNITS"]);
            for step in &out.steps {
                table.add_row(vec![
                    step.from.to_string(),
                    step.to.to_string(),
                    step.slot.to_string(),
                    step.packet.clone(),
                    step.acted.to_string(),
                    step.units.join(" "),
                ]);
            }
            println!("{table}");
            println!(
                "client={} server={} received={}",
                out.client_state,
                out.server_state,
                out.received.join(",")
            );
        }
        OutputFormat::Pretty => {
            for step in &out.steps {
                println!(
                    "{} -> {} slot={} packet={} acted={}",
                    step.from, step.to, step.slot, step.packet, step.acted
                );
            }
            println!(
                "client={} server={} received={}",
                out.client_state,
                out.server_state,
                out.received.join(",")
            );
        }
    }
}
