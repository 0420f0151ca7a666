//! Errors surfaced by store implementations.

use thiserror::Error;

/// Failure of a [`SessionStore`](crate::SessionStore) or
/// [`DirectoryLookup`](crate::DirectoryLookup) call.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The referenced interaction does not exist.
    #[error("interaction not found: {0}")]
    InteractionNotFound(String),

    /// The backend failed (I/O, pool exhaustion, constraint violation).
    #[error("store backend error: {0}")]
    Backend(String),

    /// A stored value could not be decoded.
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

/// Convenience alias for store results.
pub type Result<T> = std::result::Result<T, StoreError>;
