//! Per-slot connection state.
//!
//! The table only records state. It never encodes or sends anything; each
//! inbound handshake yields a [`Transition`] and the session acts on it.

use std::time::{Duration, Instant};

use hcn_wire::{ConnectionState, Handshake, PeerIndex, PeerRole, Side, MAX_PEERS};
use tracing::debug;

/// What the remote end announced in its handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerHandshake {
    pub role: PeerRole,
    pub version: String,
}

/// State of one preallocated peer slot.
#[derive(Debug, Clone, Default)]
pub struct Slot {
    state: ConnectionState,
    peer: Option<PeerHandshake>,
    entered: Option<Instant>,
}

impl Slot {
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn peer(&self) -> Option<&PeerHandshake> {
        self.peer.as_ref()
    }

    /// When the slot entered its current handshake state, if it is in one.
    pub fn handshake_started(&self) -> Option<Instant> {
        self.entered
    }

    fn reset(&mut self) {
        *self = Slot::default();
    }
}

/// Result of feeding an inbound handshake to the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Server accepted a client hello. The slot is running and a
    /// server-to-client handshake must be sent back.
    Reply,
    /// Client received the server's answer. The slot is running.
    Established,
    /// The handshake did not fit the slot's state. The slot was reset.
    Rejected { received: ConnectionState },
}

impl Transition {
    pub fn is_running(self) -> bool {
        !matches!(self, Transition::Rejected { .. })
    }
}

/// Connection state for every peer slot.
#[derive(Debug, Clone)]
pub struct SessionTable {
    slots: [Slot; MAX_PEERS],
}

impl SessionTable {
    pub fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| Slot::default()),
        }
    }

    pub fn slot(&self, slot: PeerIndex) -> &Slot {
        &self.slots[slot.as_usize()]
    }

    pub fn state(&self, slot: PeerIndex) -> ConnectionState {
        self.slot(slot).state
    }

    pub fn is_running(&self, slot: PeerIndex) -> bool {
        self.state(slot) == ConnectionState::Running
    }

    pub fn peer(&self, slot: PeerIndex) -> Option<&PeerHandshake> {
        self.slot(slot).peer()
    }

    /// Forget everything about a slot. Call on peer join and leave.
    pub fn clear(&mut self, slot: PeerIndex) {
        let entry = &mut self.slots[slot.as_usize()];
        if entry.state != ConnectionState::None {
            debug!(%slot, from = %entry.state, "clearing slot");
        }
        entry.reset();
    }

    pub fn clear_all(&mut self) {
        for slot in PeerIndex::all() {
            self.clear(slot);
        }
    }

    /// Mark a client hello as sent on `slot`.
    pub fn begin_handshake(&mut self, slot: PeerIndex, now: Instant) {
        let entry = &mut self.slots[slot.as_usize()];
        debug!(%slot, from = %entry.state, "client handshake started");
        entry.state = ConnectionState::HandshakeC2S;
        entry.peer = None;
        entry.entered = Some(now);
    }

    /// Apply an inbound handshake for a local endpoint on `side`.
    ///
    /// A server answers any client hello, whatever the slot held before. A
    /// client only accepts the server's answer while its own hello is
    /// outstanding. Anything else resets the slot.
    pub fn receive_handshake(
        &mut self,
        side: Side,
        slot: PeerIndex,
        handshake: &Handshake,
    ) -> Transition {
        let entry = &mut self.slots[slot.as_usize()];
        let accepted = match (side, handshake.state) {
            (Side::Server, ConnectionState::HandshakeC2S) => Some(Transition::Reply),
            (Side::Client, ConnectionState::HandshakeS2C)
                if entry.state == ConnectionState::HandshakeC2S =>
            {
                Some(Transition::Established)
            }
            _ => None,
        };

        match accepted {
            Some(transition) => {
                debug!(
                    %slot,
                    from = %entry.state,
                    peer = %handshake.role,
                    version = %handshake.version,
                    "slot running"
                );
                entry.state = ConnectionState::Running;
                entry.entered = None;
                entry.peer = Some(PeerHandshake {
                    role: handshake.role,
                    version: handshake.version.clone(),
                });
                transition
            }
            None => {
                debug!(
                    %slot,
                    from = %entry.state,
                    received = %handshake.state,
                    "unexpected handshake, resetting slot"
                );
                entry.reset();
                Transition::Rejected {
                    received: handshake.state,
                }
            }
        }
    }

    /// Reset slots that have been mid-handshake for at least `timeout`.
    ///
    /// Returns the slots that were reset.
    pub fn expire(&mut self, now: Instant, timeout: Duration) -> Vec<PeerIndex> {
        let mut expired = Vec::new();
        for slot in PeerIndex::all() {
            let entry = &self.slots[slot.as_usize()];
            let stale = entry.state.is_handshaking()
                && entry
                    .entered
                    .is_some_and(|started| now.saturating_duration_since(started) >= timeout);
            if stale {
                debug!(%slot, state = %entry.state, "handshake timed out");
                self.slots[slot.as_usize()].reset();
                expired.push(slot);
            }
        }
        expired
    }
}

impl Default for SessionTable {
    fn default() -> Self {
        Self::new()
    }
}
