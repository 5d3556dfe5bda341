//! History-level error types.

use thiserror::Error;

use remote::RemoteError;

/// Errors surfaced by the history engine to its caller.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum HistoryError {
    /// A lazy action was mutated after it was flushed (or before it was queued).
    #[error("lazy action '{0}' is not open")]
    LazyActionNotOpen(String),

    /// An action that works on the selection was started with nothing selected.
    #[error("nothing is selected")]
    EmptySelection,

    /// A remote call made by an async action failed; the action was rolled back.
    #[error("remote call failed: {0}")]
    Remote(#[from] RemoteError),
}
