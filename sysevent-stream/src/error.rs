use sysevent_source::SourceError;
use thiserror::Error;

/// Errors that can occur when creating consumer streams
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    /// The shared source could not be constructed; no stream was created
    #[error("Event source unavailable: {0}")]
    SourceUnavailable(#[from] SourceError),

    /// Configuration rejected by validation
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A process-wide manager has already been installed
    #[error("A process-wide sysevent manager is already installed")]
    AlreadyInstalled,
}

/// Result type for stream operations
pub type Result<T> = std::result::Result<T, StreamError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_error_conversion() {
        let err: StreamError = SourceError::PermissionDenied("sysevent".to_string()).into();
        assert!(matches!(
            err,
            StreamError::SourceUnavailable(SourceError::PermissionDenied(_))
        ));
        assert!(err.to_string().starts_with("Event source unavailable"));
    }
}
