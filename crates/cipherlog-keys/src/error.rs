//! Error types for the keys crate.

use thiserror::Error;

/// Errors from key derivation, sealing, and key-list operations.
#[derive(Debug, Error)]
pub enum KeysError {
    #[error("encryption error: {0}")]
    Encryption(String),

    #[error("decryption error: {0}")]
    Decryption(String),

    #[error("invalid nonce length: {0}")]
    InvalidNonceLength(usize),

    #[error("invalid key length: expected 32, got {0}")]
    InvalidKeyLength(usize),

    #[error("base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for key operations.
pub type Result<T> = std::result::Result<T, KeysError>;
