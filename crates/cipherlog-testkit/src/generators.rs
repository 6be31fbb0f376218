//! Proptest generators for property-based testing.

use proptest::prelude::*;

use cipherlog_core::{AuthorId, PersistenceId, WireRecord};
use cipherlog_keys::{KeyInterval, KeyList, SecretKey};

/// Generate a feed identity.
pub fn author_id() -> impl Strategy<Value = AuthorId> {
    "[a-z]{3,12}".prop_map(|name| AuthorId::new(format!("@{name}")))
}

/// Generate an entity identifier.
pub fn persistence_id() -> impl Strategy<Value = PersistenceId> {
    "[a-z]{3,10}-[0-9]{1,4}".prop_map(PersistenceId::new)
}

/// Generate an event manifest name.
pub fn manifest() -> impl Strategy<Value = String> {
    "[a-z]{3,8}\\.[A-Z][a-z]{2,10}"
}

/// Generate a valid sequence number (1-indexed).
pub fn sequence_nr() -> impl Strategy<Value = u64> {
    1u64..=u64::MAX / 2
}

/// Generate a structured JSON payload.
pub fn payload() -> impl Strategy<Value = serde_json::Value> {
    let leaf = prop_oneof![
        any::<bool>().prop_map(serde_json::Value::from),
        any::<i64>().prop_map(serde_json::Value::from),
        "[ -~]{0,40}".prop_map(serde_json::Value::from),
    ];
    leaf.prop_recursive(3, 24, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(serde_json::Value::from),
            prop::collection::btree_map("[a-z]{1,8}", inner, 0..6)
                .prop_map(|map| serde_json::Value::Object(map.into_iter().collect())),
        ]
    })
}

/// Generate a random symmetric key.
pub fn secret_key() -> impl Strategy<Value = SecretKey> {
    any::<[u8; 32]>().prop_map(SecretKey::from_bytes)
}

/// Generate a key interval with a plausible nonce length.
pub fn key_interval() -> impl Strategy<Value = KeyInterval> {
    (sequence_nr(), secret_key(), 8usize..=12).prop_map(|(start, key, nonce_length)| {
        KeyInterval::new(start, key, nonce_length)
    })
}

/// Generate a key list with distinct, ordered start sequence numbers.
pub fn key_list(max_len: usize) -> impl Strategy<Value = KeyList> {
    prop::collection::vec(key_interval(), 0..=max_len)
        .prop_map(|intervals| intervals.into_iter().collect())
}

/// Generate a plain (non-control) event record.
pub fn event_record() -> impl Strategy<Value = WireRecord> {
    (persistence_id(), sequence_nr(), manifest(), payload())
        .prop_map(|(pid, seq, manifest, payload)| WireRecord::event(pid, seq, manifest, payload))
}
