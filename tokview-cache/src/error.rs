//! Error types for cache operations
//!
//! These errors stay inside the crate boundary: `CacheService` converts every
//! one of them into a stale-data response or a failure envelope before it
//! reaches a caller.

use thiserror::Error;

/// Main error type for cache store operations
#[derive(Error, Debug)]
pub enum CacheError {
    /// An entry could not be read or written; the message names the key
    #[error("Store error: {0}")]
    StoreError(String),

    /// Filesystem error from a file-backed store
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Serialization/Deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type alias for cache operations
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = CacheError::StoreError("disk full".to_string());
        assert_eq!(error.to_string(), "Store error: disk full");

        let config = CacheError::ConfigError("max_entries must be positive".to_string());
        assert!(config.to_string().contains("max_entries"));
    }

    #[test]
    fn test_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let error: CacheError = io.into();
        assert!(matches!(error, CacheError::IoError(_)));
    }
}
