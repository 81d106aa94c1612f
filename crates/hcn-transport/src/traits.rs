use hcn_wire::PeerIndex;

use crate::error::Result;

/// Hands a zero-terminated chat line to the host for delivery to one peer.
///
/// Delivery is fire-and-forget: `Ok` means the host accepted the line, not
/// that the peer received it. On a client the slot is always
/// [`PeerIndex::SERVER`].
pub trait Transport {
    /// Send one encoded line (terminator included) to `slot`.
    fn send(&mut self, slot: PeerIndex, line: &[u16]) -> Result<()>;
}

impl<F> Transport for F
where
    F: FnMut(PeerIndex, &[u16]),
{
    fn send(&mut self, slot: PeerIndex, line: &[u16]) -> Result<()> {
        self(slot, line);
        Ok(())
    }
}
