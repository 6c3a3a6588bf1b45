//! Error types for xCloud.

use thiserror::Error;

/// Common error type for xCloud.
#[derive(Error, Debug)]
pub enum XcloudError {
    /// A virtual path or file name is unsafe (traversal, separators, illegal characters).
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// A folder or archive name does not pass sanitization.
    #[error("invalid name: {0}")]
    InvalidName(String),

    /// The entry already exists.
    #[error("{0} already exists")]
    Conflict(String),

    /// Resource not found.
    #[error("{0} not found")]
    NotFound(String),

    /// Access to a resource was refused.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Upload exceeded the configured ceiling (in bytes).
    #[error("upload exceeds the maximum size of {0} bytes")]
    TooLarge(u64),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Zip archive error.
    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// A bounded search (e.g. collision probing) ran out of candidates.
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    /// Validation error for user input.
    #[error("validation error: {0}")]
    Validation(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<tokio::task::JoinError> for XcloudError {
    fn from(e: tokio::task::JoinError) -> Self {
        XcloudError::Io(std::io::Error::other(e.to_string()))
    }
}

/// Result type alias for xCloud operations.
pub type Result<T> = std::result::Result<T, XcloudError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_path_display() {
        let err = XcloudError::InvalidPath("segment '..' is not allowed".to_string());
        assert_eq!(err.to_string(), "invalid path: segment '..' is not allowed");
    }

    #[test]
    fn test_conflict_display() {
        let err = XcloudError::Conflict("folder".to_string());
        assert_eq!(err.to_string(), "folder already exists");
    }

    #[test]
    fn test_not_found_error_display() {
        let err = XcloudError::NotFound("file".to_string());
        assert_eq!(err.to_string(), "file not found");
    }

    #[test]
    fn test_too_large_display() {
        let err = XcloudError::TooLarge(1024);
        assert_eq!(err.to_string(), "upload exceeds the maximum size of 1024 bytes");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: XcloudError = io_err.into();
        assert!(matches!(err, XcloudError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_result_alias() {
        fn sample_ok() -> Result<i32> {
            Ok(42)
        }

        fn sample_err() -> Result<i32> {
            Err(XcloudError::PermissionDenied("private".to_string()))
        }

        assert_eq!(sample_ok().unwrap(), 42);
        assert!(sample_err().is_err());
    }
}
