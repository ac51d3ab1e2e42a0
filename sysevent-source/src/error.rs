//! Error types for the sysevent-source crate.

/// Errors raised by a [`Source`](crate::Source) or its factory.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    /// The kernel event channel refused the subscription
    #[error("Permission denied opening event channel: {0}")]
    PermissionDenied(String),

    /// The channel is already bound or the system ran out of handles
    #[error("Event channel resources exhausted: {0}")]
    ResourceExhausted(String),

    /// No source is available in this process
    #[error("Event source unavailable: {0}")]
    Unavailable(String),

    /// The delivery worker could not be started or stopped cleanly
    #[error("Delivery worker error: {0}")]
    Worker(String),
}

/// Result type for source operations
pub type Result<T> = std::result::Result<T, SourceError>;
