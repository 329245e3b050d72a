//! Error types for Dspace.

use thiserror::Error;

/// Common error type for Dspace.
#[derive(Error, Debug)]
pub enum DspaceError {
    /// Database error.
    ///
    /// Errors from sqlx are converted into this variant.
    #[error("database error: {0}")]
    Database(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Validation error for request input (never retried).
    #[error("validation error: {0}")]
    Validation(String),

    /// Resource not found.
    #[error("{0} not found")]
    NotFound(String),

    /// Malformed chunk locator string.
    #[error("invalid chunk locator: {0}")]
    Locator(String),

    /// Zip archive could not be produced.
    #[error("archive error: {0}")]
    Archive(String),

    /// Transient failure talking to the storage platform.
    #[error("platform error: {0}")]
    Platform(String),

    /// A bounded retry loop gave up.
    #[error("{operation} failed after {attempts} attempts: {last_error}")]
    RetryExhausted {
        /// Name of the retried operation.
        operation: String,
        /// Number of attempts made.
        attempts: u32,
        /// The error returned by the final attempt.
        last_error: Box<DspaceError>,
    },

    /// The stored document changed between read and write.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<sqlx::Error> for DspaceError {
    fn from(e: sqlx::Error) -> Self {
        DspaceError::Database(e.to_string())
    }
}

impl From<serde_json::Error> for DspaceError {
    fn from(e: serde_json::Error) -> Self {
        DspaceError::Serialization(e.to_string())
    }
}

/// Result type alias for Dspace operations.
pub type Result<T> = std::result::Result<T, DspaceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_display() {
        let err = DspaceError::Validation("directory structure missing".to_string());
        assert_eq!(
            err.to_string(),
            "validation error: directory structure missing"
        );
    }

    #[test]
    fn test_not_found_error_display() {
        let err = DspaceError::NotFound("record".to_string());
        assert_eq!(err.to_string(), "record not found");
    }

    #[test]
    fn test_retry_exhausted_display() {
        let err = DspaceError::RetryExhausted {
            operation: "chunk upload".to_string(),
            attempts: 3,
            last_error: Box::new(DspaceError::Platform("503".to_string())),
        };
        assert_eq!(
            err.to_string(),
            "chunk upload failed after 3 attempts: platform error: 503"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: DspaceError = io_err.into();
        assert!(matches!(err, DspaceError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_serde_error_conversion() {
        let parse_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: DspaceError = parse_err.into();
        assert!(matches!(err, DspaceError::Serialization(_)));
    }
}
