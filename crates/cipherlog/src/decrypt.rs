//! Fail-closed read-side decryption.
//!
//! A record we cannot decrypt is a record we cannot see: wrong key, missing
//! interval, garbled ciphertext and absent input all collapse to `None`.
//! Failures are logged at debug level and never propagate as errors, since a
//! follower legitimately holds no keys for entities it was never granted.

use cipherlog_core::{Event, Payload};
use cipherlog_keys::{open, KeyList};

/// Decrypts `event` against `keys`, passing plaintext events through
/// unchanged.
pub fn decrypt_event(keys: &KeyList, event: Option<Event>) -> Option<Event> {
    let event = event?;
    if !event.encrypted {
        return Some(event);
    }
    let ciphertext = match &event.payload {
        Payload::Cipher(text) => text,
        Payload::Plain(_) => {
            tracing::debug!(
                persistence_id = %event.persistence_id,
                sequence_nr = event.sequence_nr,
                "encrypted event carries a non-string payload, dropping"
            );
            return None;
        }
    };

    let interval = match keys.key_for_sequence_nr(event.sequence_nr) {
        Some(interval) => interval,
        None => {
            tracing::debug!(
                persistence_id = %event.persistence_id,
                sequence_nr = event.sequence_nr,
                "no key interval covers this sequence number, dropping"
            );
            return None;
        }
    };

    let plaintext = match open(&interval.key, interval.nonce_length, ciphertext) {
        Ok(bytes) => bytes,
        Err(err) => {
            tracing::debug!(
                persistence_id = %event.persistence_id,
                sequence_nr = event.sequence_nr,
                error = %err,
                "decryption failed, dropping"
            );
            return None;
        }
    };

    match serde_json::from_slice(&plaintext) {
        Ok(value) => Some(Event {
            payload: Payload::Plain(value),
            encrypted: false,
            ..event
        }),
        Err(err) => {
            tracing::debug!(
                persistence_id = %event.persistence_id,
                sequence_nr = event.sequence_nr,
                error = %err,
                "decrypted payload is not valid JSON, dropping"
            );
            None
        }
    }
}
