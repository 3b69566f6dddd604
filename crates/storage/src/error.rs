//! Error types for storage operations.

use thiserror::Error;

/// Errors that can occur during object store operations.
#[derive(Error, Debug, Clone)]
pub enum StorageError {
    /// Object not found.
    #[error("Object not found: {bucket}/{key}")]
    NotFound { bucket: String, key: String },

    /// Bucket does not exist.
    #[error("Bucket not found: {bucket}")]
    BucketNotFound { bucket: String },

    /// Access denied.
    #[error("Access denied to {bucket}/{key}: {message}")]
    AccessDenied {
        bucket: String,
        key: String,
        message: String,
    },

    /// Network error.
    #[error("Network error: {message}")]
    NetworkError { message: String, retryable: bool },

    /// Invalid configuration (credentials, region, bucket name).
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// Other error.
    #[error("{message}")]
    Other { message: String },
}

impl StorageError {
    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            StorageError::NetworkError { retryable, .. } => *retryable,
            StorageError::NotFound { .. } => false,
            StorageError::BucketNotFound { .. } => false,
            StorageError::AccessDenied { .. } => false,
            StorageError::InvalidConfig { .. } => false,
            StorageError::Other { .. } => false,
        }
    }

    /// Check if this error means the object or bucket does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StorageError::NotFound { .. } | StorageError::BucketNotFound { .. }
        )
    }
}

/// Non-fatal error recorded for one artifact or object during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferError {
    /// The local path or remote key that failed.
    pub key: String,
    /// Human-readable failure description.
    pub message: String,
}

impl TransferError {
    /// Create a new transfer error.
    pub fn new(key: impl Into<String>, message: impl ToString) -> Self {
        Self {
            key: key.into(),
            message: message.to_string(),
        }
    }
}

impl std::fmt::Display for TransferError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.key, self.message)
    }
}
