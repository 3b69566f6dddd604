//! Error types for publish runs.

use hoist_common::PathError;
use hoist_filesystem::FileSystemError;
use hoist_storage::StorageError;
use thiserror::Error;

/// Errors that abort a publish run.
///
/// Per-artifact failures never surface here; they are counted in the
/// [`PublishReport`](crate::PublishReport) instead.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Destination bucket {bucket} does not exist")]
    DestinationMissing { bucket: String },

    #[error("Setup failed: {message}")]
    Setup { message: String },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("File system error: {0}")]
    FileSystem(#[from] FileSystemError),

    #[error("Invalid path: {0}")]
    Path(#[from] PathError),

    #[error("Publish run was cancelled")]
    Cancelled,
}

/// Failure transforming one logical file.
#[derive(Debug, Error)]
pub enum TransformError {
    #[error("Compression failed for {path}: {message}")]
    Compression { path: String, message: String },

    #[error("Transform failed for {path}: {message}")]
    Failed { path: String, message: String },
}

impl TransformError {
    /// Create a generic transform failure.
    pub fn failed(path: impl Into<String>, message: impl ToString) -> Self {
        TransformError::Failed {
            path: path.into(),
            message: message.to_string(),
        }
    }
}
