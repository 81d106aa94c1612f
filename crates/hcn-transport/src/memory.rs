use std::collections::VecDeque;

use hcn_wire::{PeerIndex, CHAT_TYPE};
use tracing::{trace, warn};

use crate::error::{Result, TransportError};
use crate::traits::Transport;

/// One outbound chat line as the host would have sent it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatLine {
    /// Destination slot.
    pub slot: PeerIndex,
    /// Chat category the line was sent on.
    pub chat_type: u32,
    /// Encoded units, terminator included.
    pub units: Vec<u16>,
}

/// In-memory transport that queues every line it is handed.
///
/// Useful for tests and for wiring two sessions back to back: drain one
/// side's queue and feed each line to the other side's session.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    queue: VecDeque<ChatLine>,
    chat_type: Option<u32>,
    capacity: Option<usize>,
    closed: bool,
}

impl MemoryTransport {
    /// Unbounded transport recording lines on [`CHAT_TYPE`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Transport that refuses lines once `capacity` are queued.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: Some(capacity),
            ..Self::default()
        }
    }

    /// Record lines on a different chat category.
    pub fn on_chat_type(mut self, chat_type: u32) -> Self {
        self.chat_type = Some(chat_type);
        self
    }

    /// Chat category stamped on recorded lines.
    pub fn chat_type(&self) -> u32 {
        self.chat_type.unwrap_or(CHAT_TYPE)
    }

    /// Queued lines, oldest first.
    pub fn lines(&self) -> impl Iterator<Item = &ChatLine> {
        self.queue.iter()
    }

    /// Remove and return every queued line, oldest first.
    pub fn drain(&mut self) -> Vec<ChatLine> {
        self.queue.drain(..).collect()
    }

    /// Remove and return the oldest queued line.
    pub fn pop(&mut self) -> Option<ChatLine> {
        self.queue.pop_front()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Refuse every later line with [`TransportError::Closed`].
    pub fn close(&mut self) {
        self.closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Transport for MemoryTransport {
    fn send(&mut self, slot: PeerIndex, line: &[u16]) -> Result<()> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        if let Some(capacity) = self.capacity {
            if self.queue.len() >= capacity {
                warn!(%slot, capacity, "memory transport full, dropping line");
                return Err(TransportError::Full { capacity });
            }
        }

        trace!(%slot, units = line.len(), "queued chat line");
        self.queue.push_back(ChatLine {
            slot,
            chat_type: self.chat_type(),
            units: line.to_vec(),
        });
        Ok(())
    }
}
