//! Error types for the `SQLite` backend.

use sanchar_core::StoreError;
use thiserror::Error;

/// Errors raised inside the `SQLite` backend.
#[derive(Debug, Error)]
pub enum SqliteStoreError {
    /// `SQLite` database error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Connection pool error.
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// JSON column could not be encoded or decoded.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Schema migration failed.
    #[error("migration error: {message}")]
    Migration {
        /// Describes which migration failed and why.
        message: String,
    },

    /// Requested interaction was not found.
    #[error("interaction not found: {0}")]
    InteractionNotFound(String),

    /// A column held a value the domain model does not accept.
    #[error("corrupt column {column}: {reason}")]
    Corrupt {
        /// Column name.
        column: &'static str,
        /// What was wrong.
        reason: String,
    },
}

/// Convenience alias for backend results.
pub type Result<T> = std::result::Result<T, SqliteStoreError>;

impl From<SqliteStoreError> for StoreError {
    fn from(err: SqliteStoreError) -> Self {
        match err {
            SqliteStoreError::InteractionNotFound(id) => Self::InteractionNotFound(id),
            SqliteStoreError::Corrupt { .. } | SqliteStoreError::Serde(_) => {
                Self::Corrupt(err.to_string())
            }
            other => Self::Backend(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn not_found_maps_to_domain_not_found() {
        let err: StoreError = SqliteStoreError::InteractionNotFound("int_1".into()).into();
        assert_matches!(err, StoreError::InteractionNotFound(id) if id == "int_1");
    }

    #[test]
    fn sqlite_error_maps_to_backend() {
        let err: StoreError = SqliteStoreError::Sqlite(rusqlite::Error::QueryReturnedNoRows).into();
        assert_matches!(err, StoreError::Backend(_));
    }

    #[test]
    fn corrupt_maps_to_corrupt() {
        let err: StoreError = SqliteStoreError::Corrupt {
            column: "status",
            reason: "unknown status value: missed".into(),
        }
        .into();
        assert_matches!(err, StoreError::Corrupt(msg) if msg.contains("status"));
    }
}
