//! Key-share messages: how keys travel over the private channel.
//!
//! Distribution fans out in fixed-size batches: a small recipient ceiling
//! per private message, and a small key-count ceiling so a full historical
//! key list sent to a new grantee never outgrows a private message. Both
//! ceilings are independent of the feed's message-size ceiling.

use serde::{Deserialize, Serialize};

use cipherlog_core::PersistenceId;

use crate::crypto::SecretKey;
use crate::interval::KeyInterval;

/// The `type` discriminator of key-share messages on the private channel.
pub const KEY_SHARE_TYPE: &str = "entity-keys";

/// Maximum recipients per private message.
pub const MAX_RECIPIENTS_PER_MESSAGE: usize = 7;

/// Maximum key intervals per private message.
pub const MAX_KEYS_PER_MESSAGE: usize = 4;

/// A batch of key intervals for one entity, delivered privately.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyShareMessage {
    /// Message type discriminator, always [`KEY_SHARE_TYPE`].
    #[serde(rename = "type")]
    pub message_type: String,

    /// The entity these keys decrypt.
    pub persistence_id: PersistenceId,

    /// Key intervals, each naming the first sequence number it covers.
    pub keys: Vec<KeyInterval>,
}

impl KeyShareMessage {
    /// Create a key-share message.
    pub fn new(persistence_id: PersistenceId, keys: Vec<KeyInterval>) -> Self {
        Self {
            message_type: KEY_SHARE_TYPE.to_string(),
            persistence_id,
            keys,
        }
    }

    /// Whether a decoded private message is a key share.
    pub fn is_key_share(value: &serde_json::Value) -> bool {
        value.get("type").and_then(|t| t.as_str()) == Some(KEY_SHARE_TYPE)
    }
}

/// The plaintext payload of a set-key control record (sealed with the key
/// it announces before it reaches the public feed).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetKeyPayload {
    /// The new symmetric key.
    pub key: SecretKey,

    /// Nonce length for payloads sealed under this key.
    pub nonce_length: usize,
}

/// Split a slice into fixed-size batches, last batch possibly short.
pub fn batched<T: Clone>(items: &[T], size: usize) -> Vec<Vec<T>> {
    assert!(size > 0, "batch size must be positive");
    items.chunks(size).map(|chunk| chunk.to_vec()).collect()
}
