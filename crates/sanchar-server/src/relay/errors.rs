//! Relay errors and their wire codes.

use sanchar_core::StoreError;
use thiserror::Error;

/// Why an inbound event was rejected.
///
/// Reported only to the originating connection, never broadcast.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Referenced interaction does not exist.
    #[error("interaction not found: {0}")]
    NotFound(String),

    /// Interaction is closed and the sender may not reopen it.
    #[error("interaction {0} is closed")]
    SessionClosed(String),

    /// The scanner is on the owner's block list.
    #[error("you have been blocked by this owner")]
    Blocked,

    /// Payload was malformed or named a non-participant.
    #[error("{0}")]
    InvalidParams(String),

    /// The store failed; nothing was broadcast.
    #[error("internal error")]
    Store(#[source] StoreError),
}

impl RelayError {
    /// Wire error code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::SessionClosed(_) => "SESSION_CLOSED",
            Self::Blocked => "BLOCKED",
            Self::InvalidParams(_) => "INVALID_PARAMS",
            Self::Store(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<StoreError> for RelayError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::InteractionNotFound(id) => Self::NotFound(id),
            other => Self::Store(other),
        }
    }
}

/// Convenience alias for relay results.
pub type Result<T> = std::result::Result<T, RelayError>;

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn codes() {
        assert_eq!(RelayError::NotFound("s".into()).code(), "NOT_FOUND");
        assert_eq!(RelayError::SessionClosed("s".into()).code(), "SESSION_CLOSED");
        assert_eq!(RelayError::Blocked.code(), "BLOCKED");
        assert_eq!(RelayError::InvalidParams("x".into()).code(), "INVALID_PARAMS");
        assert_eq!(
            RelayError::Store(StoreError::Backend("disk".into())).code(),
            "INTERNAL_ERROR"
        );
    }

    #[test]
    fn store_not_found_maps_to_not_found() {
        let err: RelayError = StoreError::InteractionNotFound("int_1".into()).into();
        assert_matches!(err, RelayError::NotFound(id) if id == "int_1");
    }

    #[test]
    fn store_failure_hides_details_from_client() {
        let err: RelayError = StoreError::Backend("pool exhausted".into()).into();
        assert_eq!(err.to_string(), "internal error");
    }
}
