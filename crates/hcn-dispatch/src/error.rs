use hcn_wire::WireError;

/// Errors that can occur while routing a payload to a handler.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    /// A key/value string has no `=` separator.
    #[error("key/value pair has no '=' separator")]
    MissingSeparator,

    /// No handler is registered for the key (strict registries only).
    #[error("no handler registered for key {0:?}")]
    UnknownKey(String),

    /// A batch entry carried a type of zero or beyond the handler table.
    #[error("batch entry {index} has out-of-range type {entry_type}")]
    BatchEntryOutOfRange { index: usize, entry_type: u8 },

    /// An outbound pair violated a wire bound.
    #[error(transparent)]
    Wire(#[from] WireError),
}

pub type Result<T> = std::result::Result<T, DispatchError>;
