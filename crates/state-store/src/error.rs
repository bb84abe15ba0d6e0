use thiserror::Error;

use crate::Version;

/// Errors that can occur when interacting with the state store.
#[derive(Debug, Error)]
pub enum StateStoreError {
    /// A conditional write found a different version than the caller expected.
    #[error("Version conflict for key '{key}': expected version {expected}, found {actual}")]
    VersionConflict {
        key: String,
        expected: Version,
        actual: Version,
    },

    /// The store could not be reached or refused service.
    #[error("State store unavailable: {0}")]
    Unavailable(String),

    /// The requested operation batch is malformed.
    #[error("Invalid state operation: {0}")]
    InvalidOperation(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StateStoreError {
    /// Returns true for faults that may clear up if the operation is retried
    /// later: connectivity loss, pool exhaustion, I/O errors.
    pub fn is_transient(&self) -> bool {
        match self {
            StateStoreError::Unavailable(_) => true,
            StateStoreError::Database(e) => matches!(
                e,
                sqlx::Error::Io(_)
                    | sqlx::Error::PoolTimedOut
                    | sqlx::Error::PoolClosed
                    | sqlx::Error::WorkerCrashed
            ),
            _ => false,
        }
    }

    /// Returns true if this is an optimistic concurrency conflict.
    pub fn is_conflict(&self) -> bool {
        matches!(self, StateStoreError::VersionConflict { .. })
    }
}

/// Result type for state store operations.
pub type Result<T> = std::result::Result<T, StateStoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unavailable_is_transient() {
        let err = StateStoreError::Unavailable("connection refused".to_string());
        assert!(err.is_transient());
        assert!(!err.is_conflict());
    }

    #[test]
    fn pool_timeout_is_transient() {
        let err = StateStoreError::Database(sqlx::Error::PoolTimedOut);
        assert!(err.is_transient());
    }

    #[test]
    fn conflict_is_not_transient() {
        let err = StateStoreError::VersionConflict {
            key: "Cars".to_string(),
            expected: Version::first(),
            actual: Version::new(2),
        };
        assert!(err.is_conflict());
        assert!(!err.is_transient());
        assert_eq!(
            err.to_string(),
            "Version conflict for key 'Cars': expected version 1, found 2"
        );
    }
}
