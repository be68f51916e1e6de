//! Error types for prefetchr
//!
//! Centralized error handling using thiserror.
//!
//! The scheduler's public mutating surface never returns these: individual
//! load failures become non-fatal attempt outcomes. These errors exist for
//! the internals (loaders, config, CLI plumbing).

use thiserror::Error;

/// All error types that can occur in prefetchr
#[derive(Debug, Error)]
pub enum PrefetchError {
    /// Url could not be parsed or resolved against the base origin
    #[error("Invalid url: {0}")]
    InvalidUrl(String),

    /// Configuration value out of range or unreadable
    #[error("Config error: {0}")]
    Config(String),

    /// HTTP transport error from the resource loader
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Load was abandoned via its cancellation token
    #[error("Load cancelled")]
    Cancelled,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for prefetchr operations
pub type Result<T> = std::result::Result<T, PrefetchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_url_error() {
        let err = PrefetchError::InvalidUrl("not a url".to_string());
        assert_eq!(err.to_string(), "Invalid url: not a url");
    }

    #[test]
    fn test_config_error() {
        let err = PrefetchError::Config("max_concurrent_requests must be >= 1".to_string());
        assert_eq!(
            err.to_string(),
            "Config error: max_concurrent_requests must be >= 1"
        );
    }

    #[test]
    fn test_cancelled_error() {
        let err = PrefetchError::Cancelled;
        assert_eq!(err.to_string(), "Load cancelled");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: PrefetchError = io_err.into();
        assert!(matches!(err, PrefetchError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid").unwrap_err();
        let err: PrefetchError = json_err.into();
        assert!(matches!(err, PrefetchError::Json(_)));
    }

    #[test]
    fn test_result_type_alias() {
        fn returns_ok() -> Result<i32> {
            Ok(42)
        }

        fn returns_err() -> Result<i32> {
            Err(PrefetchError::Cancelled)
        }

        assert!(returns_ok().is_ok());
        assert!(returns_err().is_err());
    }
}
