use std::fmt;

use crate::error::WireError;

/// Number of preallocated connection slots.
pub const MAX_PEERS: usize = 16;

/// Index of one connection slot, always in `0..16`.
///
/// Servers address remote players through slots 1-15 (and sometimes 0 for
/// themselves). A client always talks to its server through slot 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerIndex(u8);

impl PeerIndex {
    /// The slot a client uses for its server.
    pub const SERVER: PeerIndex = PeerIndex(0);

    /// Create a peer index, rejecting anything past the last slot.
    pub fn new(index: u8) -> Result<Self, WireError> {
        if usize::from(index) < MAX_PEERS {
            Ok(Self(index))
        } else {
            Err(WireError::InvalidPeerIndex(index))
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }

    pub fn as_usize(self) -> usize {
        usize::from(self.0)
    }

    /// Every valid slot in ascending order.
    pub fn all() -> impl Iterator<Item = PeerIndex> {
        (0..MAX_PEERS as u8).map(PeerIndex)
    }
}

impl TryFrom<u8> for PeerIndex {
    type Error = WireError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<usize> for PeerIndex {
    type Error = WireError;

    fn try_from(value: usize) -> Result<Self, Self::Error> {
        let index = u8::try_from(value).map_err(|_| WireError::InvalidPeerIndex(u8::MAX))?;
        Self::new(index)
    }
}

impl From<PeerIndex> for u8 {
    fn from(index: PeerIndex) -> Self {
        index.0
    }
}

impl fmt::Display for PeerIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_all_sixteen_slots() {
        assert_eq!(PeerIndex::all().count(), MAX_PEERS);
        assert_eq!(PeerIndex::new(15).unwrap().get(), 15);
    }

    #[test]
    fn rejects_slot_sixteen_and_above() {
        assert_eq!(PeerIndex::new(16), Err(WireError::InvalidPeerIndex(16)));
        assert!(PeerIndex::try_from(300usize).is_err());
    }
}
