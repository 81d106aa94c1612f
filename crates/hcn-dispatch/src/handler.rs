//! Handler capabilities the registry dispatches to.
//!
//! Every trait has a blanket impl for closures of the matching shape, so
//! most applications register plain closures:
//!
//! ```
//! use hcn_dispatch::DispatchRegistry;
//! use hcn_wire::PeerIndex;
//!
//! let mut registry = DispatchRegistry::new();
//! registry.on_key("SJ", |slot: PeerIndex, _key: &str, value: &str| {
//!     println!("slot {slot} set SJ to {value}");
//! });
//! ```

use hcn_wire::{Datapoint, PeerIndex, TextBatch, VectorEntry};

/// Receives one matched key/value pair.
pub trait KeyValueHandler: Send + Sync {
    /// `key` is the key as sent by the peer, before any case folding.
    fn handle(&self, slot: PeerIndex, key: &str, value: &str);
}

/// Receives one datapoint batch entry.
pub trait DatapointHandler: Send + Sync {
    fn handle(&self, slot: PeerIndex, entry: &Datapoint);
}

/// Receives one vector batch entry.
pub trait VectorHandler: Send + Sync {
    fn handle(&self, slot: PeerIndex, entry: &VectorEntry);
}

/// Receives one text packet.
pub trait TextHandler: Send + Sync {
    fn handle(&self, slot: PeerIndex, text: &TextBatch);
}

impl<F> KeyValueHandler for F
where
    F: Fn(PeerIndex, &str, &str) + Send + Sync,
{
    fn handle(&self, slot: PeerIndex, key: &str, value: &str) {
        self(slot, key, value)
    }
}

impl<F> DatapointHandler for F
where
    F: Fn(PeerIndex, &Datapoint) + Send + Sync,
{
    fn handle(&self, slot: PeerIndex, entry: &Datapoint) {
        self(slot, entry)
    }
}

impl<F> VectorHandler for F
where
    F: Fn(PeerIndex, &VectorEntry) + Send + Sync,
{
    fn handle(&self, slot: PeerIndex, entry: &VectorEntry) {
        self(slot, entry)
    }
}

impl<F> TextHandler for F
where
    F: Fn(PeerIndex, &TextBatch) + Send + Sync,
{
    fn handle(&self, slot: PeerIndex, text: &TextBatch) {
        self(slot, text)
    }
}
