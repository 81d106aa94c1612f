//! Wire a client and a server session back to back and trade a few packets.
//!
//! ```sh
//! cargo run -p hcn --example loopback
//! ```

use std::sync::Arc;

use hcn::dispatch::DispatchRegistry;
use hcn::session::{Session, SessionConfig};
use hcn::transport::MemoryTransport;
use hcn::wire::{ClientKind, Datapoint, DatapointValue, PeerIndex, ServerKind};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut registry = DispatchRegistry::new();
    registry.on_key("SJ", |slot: PeerIndex, _: &str, value: &str| {
        println!("server: slot {slot} toggled SJ to {value}");
    });
    registry.on_datapoint(1, |slot: PeerIndex, entry: &Datapoint| {
        println!("server: slot {slot} reports score {}", entry.value.as_i32());
    })?;

    let mut server = Session::new(
        SessionConfig::server(ServerKind::Sapp, "1.0"),
        Arc::new(registry),
        MemoryTransport::new(),
    )?;
    let mut client = Session::new(
        SessionConfig::client(ClientKind::Chimera, "1.0"),
        Arc::new(DispatchRegistry::new()),
        MemoryTransport::new(),
    )?;

    // The host assigns each joining player a slot; this one gets 2.
    let slot = PeerIndex::new(2)?;
    server.clear_peer(slot);

    client.start_handshake()?;
    for line in client.transport_mut().drain() {
        server.process_chat(slot, line.chat_type, &line.units);
    }
    for line in server.transport_mut().drain() {
        client.process_chat(PeerIndex::SERVER, line.chat_type, &line.units);
    }
    println!(
        "client {} / server {}",
        client.state(PeerIndex::SERVER),
        server.state(slot)
    );

    client.send_key_value(PeerIndex::SERVER, "SJ=ON")?;
    client.send_datapoints(
        PeerIndex::SERVER,
        &[Datapoint::new(1, DatapointValue::from_i32(42))],
    )?;
    for line in client.transport_mut().drain() {
        println!("wire: {:04X?}", line.units);
        server.process_chat(slot, line.chat_type, &line.units);
    }

    Ok(())
}
