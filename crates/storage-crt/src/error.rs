//! Error types for S3 backend operations.

use hoist_storage::StorageError;
use thiserror::Error;

/// Errors specific to the S3 client.
#[derive(Error, Debug)]
pub enum CrtError {
    /// AWS SDK error.
    #[error("AWS SDK error: {message}")]
    SdkError { message: String, retryable: bool },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<CrtError> for StorageError {
    fn from(err: CrtError) -> Self {
        match err {
            CrtError::SdkError { message, retryable } => {
                StorageError::NetworkError { message, retryable }
            }
            CrtError::ConfigError(message) => StorageError::InvalidConfig { message },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_storage_error() {
        let err: StorageError = CrtError::SdkError {
            message: "slow down".into(),
            retryable: true,
        }
        .into();
        assert!(err.is_retryable());

        let err: StorageError = CrtError::ConfigError("no region".into()).into();
        assert!(matches!(err, StorageError::InvalidConfig { .. }));
    }
}
