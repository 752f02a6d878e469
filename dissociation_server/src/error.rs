// SPDX-License-Identifier: MIT OR Apache-2.0
//! Error types for the dissociation server.

use dissociation_engine::StoreError;
use thiserror::Error;

/// Server error type.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ServerError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// The study store could not be opened or closed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for server operations.
pub type Result<T> = std::result::Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ServerError::Config("test config error".to_string());
        assert_eq!(err.to_string(), "configuration error: test config error");

        let err = ServerError::Internal("metrics shutdown failed".to_string());
        assert_eq!(err.to_string(), "internal error: metrics shutdown failed");
    }

    #[test]
    fn test_store_error_conversion() {
        let err: ServerError = StoreError::Corpus("expected an object".to_string()).into();
        assert!(matches!(err, ServerError::Store(_)));
        assert_eq!(err.to_string(), "store error: corpus error: expected an object");
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::AddrInUse, "address in use");
        let err: ServerError = io.into();
        assert!(err.to_string().starts_with("I/O error:"));
    }
}
