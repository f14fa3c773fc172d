//! Error types for storage operations

use std::fmt;

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations
#[derive(Debug)]
pub enum StorageError {
    /// Metric failed validation (e.g. empty name)
    InvalidMetric(String),

    /// I/O error (snapshot read/write/rename)
    Io(std::io::Error),

    /// Malformed snapshot or row content
    Serialization(String),

    /// Database unreachable or ping failure
    ConnectionFailed(String),

    /// Query failed against an otherwise healthy backend
    QueryFailed(String),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::InvalidMetric(msg) => write!(f, "invalid metric: {}", msg),
            StorageError::Io(err) => write!(f, "I/O error: {}", err),
            StorageError::Serialization(msg) => {
                write!(f, "metric serialization error: {}", msg)
            }
            StorageError::ConnectionFailed(msg) => {
                write!(f, "failed to connect to storage backend: {}", msg)
            }
            StorageError::QueryFailed(msg) => write!(f, "storage query failed: {}", msg),
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StorageError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io(err)
    }
}

// sqlx error conversion (used in sqlite.rs)
#[cfg(feature = "storage-sqlite")]
impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Io(io_err) => StorageError::Io(io_err),
            _ => StorageError::QueryFailed(err.to_string()),
        }
    }
}
