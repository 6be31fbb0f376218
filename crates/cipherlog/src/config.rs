//! Journal configuration.

use cipherlog_keys::{KDF_ITERATIONS, MAX_KEYS_PER_MESSAGE, MAX_NONCE_LEN, MAX_RECIPIENTS_PER_MESSAGE};

/// Tunables for a [`crate::Journal`].
///
/// The defaults match the feed transport this was built against: an 8 KiB
/// record ceiling with a payload budget low enough that envelope fields and
/// JSON escaping never push a chunk over it.
#[derive(Debug, Clone)]
pub struct JournalConfig {
    /// Hard ceiling on a serialized record, enforced by the feed itself.
    pub max_record_size: usize,
    /// Escaped-byte budget for a single payload chunk. Must leave headroom
    /// under `max_record_size` for the envelope fields.
    pub payload_budget: usize,
    /// Recipients per private key-share message.
    pub max_recipients_per_message: usize,
    /// Key intervals per private key-share message.
    pub max_keys_per_message: usize,
    /// PBKDF2-HMAC-SHA512 iteration count for key derivation.
    pub kdf_iterations: u32,
    /// Nonce length for newly generated key intervals, at most 12.
    pub nonce_length: usize,
    /// Local secret that new entity keys are stretched from.
    pub key_secret: String,
}

impl JournalConfig {
    /// Configuration with defaults for everything but the key secret.
    pub fn new(key_secret: impl Into<String>) -> Self {
        Self {
            max_record_size: 8192,
            payload_budget: 7200,
            max_recipients_per_message: MAX_RECIPIENTS_PER_MESSAGE,
            max_keys_per_message: MAX_KEYS_PER_MESSAGE,
            kdf_iterations: KDF_ITERATIONS,
            nonce_length: MAX_NONCE_LEN,
            key_secret: key_secret.into(),
        }
    }
}
