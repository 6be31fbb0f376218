//! Error types for the feed collaborators.

use thiserror::Error;

/// Errors from the replicated feed and the private channel.
#[derive(Debug, Error)]
pub enum FeedError {
    /// The serialized envelope exceeds the feed's hard size ceiling.
    #[error("record too large: {size} bytes exceeds the {limit} byte ceiling")]
    RecordTooLarge { size: usize, limit: usize },

    /// A private message could not be delivered.
    #[error("private delivery failed: {0}")]
    DeliveryFailed(String),

    /// Envelope serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for feed operations.
pub type Result<T> = std::result::Result<T, FeedError>;
