/// Errors that can occur handing a chat line to the host.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The outbound queue has no room for another line.
    #[error("transport queue full (capacity {capacity})")]
    Full { capacity: usize },

    /// The transport has been closed and accepts no more lines.
    #[error("transport closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, TransportError>;
