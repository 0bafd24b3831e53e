//! Tessera error abstractions.

use thiserror::Error;

/// Application error variants.
///
/// Public APIs return `anyhow::Result`; callers which need to branch on a failure class
/// should `downcast` the error into this type.
#[derive(Debug, Error)]
pub enum AppError {
    /// A partition group, primitive type or similar was not configured.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// A partition was requested which is not a member of the partition group.
    #[error("routing error: {0}")]
    Routing(String),
    /// Persisted data could not be decoded.
    #[error("corrupt data: {0}")]
    CorruptData(String),
    /// The session layer failed to establish or use a connection.
    #[error("session connection error: {0}")]
    Connection(anyhow::Error),
    /// An operation observed a term older than the partition's current term.
    #[error("stale term {observed}, partition is at term {current}")]
    StaleTerm { observed: u64, current: u64 },
    /// The given input was invalid.
    #[error("validation error: {0}")]
    InvalidInput(String),
    /// The primitive, session or execution context has been closed.
    #[error("the primitive has been closed")]
    Closed,
}
