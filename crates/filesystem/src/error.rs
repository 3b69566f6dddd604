//! Error types for file system operations.

use hoist_common::PathError;
use thiserror::Error;

/// Errors that can occur while scanning a publish tree.
#[derive(Debug, Error)]
pub enum FileSystemError {
    /// A glob pattern failed to compile.
    #[error("Invalid glob pattern '{pattern}': {reason}")]
    InvalidGlobPattern { pattern: String, reason: String },

    /// The publish root (or scoped sub-directory) does not exist.
    #[error("Publish root not found: {path}")]
    RootNotFound { path: String },

    /// I/O error while walking or reading the tree.
    #[error("I/O error at {path}: {source}")]
    IoError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Path normalization error.
    #[error(transparent)]
    Path(#[from] PathError),
}
