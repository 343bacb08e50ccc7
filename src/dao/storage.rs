use std::{error::Error, time::Duration};
use thiserror::Error;
use uuid::Uuid;

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error raised by storage backends regardless of the underlying database.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage unavailable: {message}")]
    Unavailable {
        message: String,
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// No store is installed (degraded mode).
    #[error("storage unavailable (degraded mode)")]
    Degraded,
    #[error("profile `{id}` not found")]
    ProfileNotFound { id: Uuid },
    #[error("profile `{id}` already exists")]
    ProfileExists { id: Uuid },
    #[error("storage operation timed out after {0:?}")]
    Timeout(Duration),
}

impl StorageError {
    /// Construct an unavailable error from any backend failure.
    pub fn unavailable(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Unavailable {
            message,
            source: Box::new(source),
        }
    }
}
