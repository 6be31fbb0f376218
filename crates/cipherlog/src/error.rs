use cipherlog_core::{CoreError, ValidationError};
use cipherlog_feed::FeedError;
use cipherlog_keys::KeysError;
use thiserror::Error;

/// Errors surfaced by journal operations.
#[derive(Debug, Error)]
pub enum JournalError {
    #[error("invalid record: {0}")]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Keys(#[from] KeysError),

    #[error(transparent)]
    Feed(#[from] FeedError),

    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Key distribution aborted partway. The delivered batches stay
    /// delivered; retrying the same operation is safe because appends and
    /// key-list merges are idempotent.
    #[error("key distribution aborted after {sent} of {total} messages: {source}")]
    Distribution {
        sent: usize,
        total: usize,
        source: FeedError,
    },
}

pub type Result<T, E = JournalError> = std::result::Result<T, E>;
