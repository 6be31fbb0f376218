//! Wire records: the persisted shape of entity events.
//!
//! A record is immutable once appended to the feed. Oversized events are
//! split into several part records that share the same sequence number.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{AuthorId, PersistenceId, SequenceNr};

/// The `type` discriminator every cipherlog record carries on the wire.
pub const RECORD_TYPE: &str = "entity-event";

/// Manifest discriminator for key rotation control events.
pub const MANIFEST_SET_KEY: &str = "cipherlog.SetKey";

/// Manifest discriminator for access grant control events.
pub const MANIFEST_ADD_USER: &str = "cipherlog.AddUser";

/// Manifest discriminator for access revocation control events.
pub const MANIFEST_REMOVE_USER: &str = "cipherlog.RemoveUser";

/// A persisted record as it appears on the external feed.
///
/// Only `payload` is ever encrypted; the envelope fields stay in plaintext
/// so indexes can fold over the feed without key material.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireRecord {
    /// Record type discriminator, always [`RECORD_TYPE`].
    #[serde(rename = "type")]
    pub record_type: String,

    /// The entity this record belongs to.
    pub persistence_id: PersistenceId,

    /// Caller-assigned sequence number (1-based, strictly increasing
    /// per author and entity; not re-validated here).
    pub sequence_nr: SequenceNr,

    /// Payload manifest: the application event class, or one of the
    /// control manifests.
    pub manifest: String,

    /// Structured payload for plain unchunked events; a string slice for
    /// parts; a base64 string for ciphertext.
    pub payload: serde_json::Value,

    /// Whether `payload` (or the joined part payloads) is ciphertext.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub encrypted: bool,

    /// 1-based part index when this record is a fragment of an
    /// oversized event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub part: Option<u32>,

    /// Total number of parts for the event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub of: Option<u32>,

    /// Recipient identity on grant/revoke control records. Plaintext so the
    /// access index can replay without decryption.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<AuthorId>,
}

impl WireRecord {
    /// Create a plain application event record.
    pub fn event(
        persistence_id: PersistenceId,
        sequence_nr: SequenceNr,
        manifest: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            record_type: RECORD_TYPE.to_string(),
            persistence_id,
            sequence_nr,
            manifest: manifest.into(),
            payload,
            encrypted: false,
            part: None,
            of: None,
            user_id: None,
        }
    }

    /// Create a key rotation control record. The key material payload is
    /// filled in by the writer before encryption.
    pub fn set_key(persistence_id: PersistenceId, sequence_nr: SequenceNr) -> Self {
        Self::event(
            persistence_id,
            sequence_nr,
            MANIFEST_SET_KEY,
            serde_json::Value::Null,
        )
    }

    /// Create an access grant control record.
    pub fn grant(persistence_id: PersistenceId, sequence_nr: SequenceNr, user: AuthorId) -> Self {
        let mut record = Self::event(
            persistence_id,
            sequence_nr,
            MANIFEST_ADD_USER,
            serde_json::Value::Null,
        );
        record.user_id = Some(user);
        record
    }

    /// Create an access revocation control record.
    pub fn revoke(persistence_id: PersistenceId, sequence_nr: SequenceNr, user: AuthorId) -> Self {
        let mut record = Self::event(
            persistence_id,
            sequence_nr,
            MANIFEST_REMOVE_USER,
            serde_json::Value::Null,
        );
        record.user_id = Some(user);
        record
    }

    /// Whether this record is a fragment of an oversized event.
    pub fn is_part(&self) -> bool {
        self.part.is_some()
    }

    /// Whether this is the final fragment of its run.
    pub fn is_final_part(&self) -> bool {
        self.part.is_some() && self.part == self.of
    }

    /// Classify the record's manifest into a control event, if any.
    pub fn control_event(&self) -> Option<ControlEvent> {
        match self.manifest.as_str() {
            MANIFEST_SET_KEY => Some(ControlEvent::SetKey),
            MANIFEST_ADD_USER => self
                .user_id
                .clone()
                .map(|user| ControlEvent::Grant { user }),
            MANIFEST_REMOVE_USER => self
                .user_id
                .clone()
                .map(|user| ControlEvent::Revoke { user }),
            _ => None,
        }
    }

    /// Whether this record carries a control manifest.
    pub fn is_control(&self) -> bool {
        matches!(
            self.manifest.as_str(),
            MANIFEST_SET_KEY | MANIFEST_ADD_USER | MANIFEST_REMOVE_USER
        )
    }

    /// Serialized envelope size in bytes, as it will appear on the wire.
    pub fn serialized_len(&self) -> usize {
        serde_json::to_string(self).map(|s| s.len()).unwrap_or(0)
    }
}

/// Control events recognized in the persist path.
///
/// Closed set: the persist path matches exhaustively so an unhandled
/// discriminator is a compile error, not a silent default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlEvent {
    /// Rotate the entity's symmetric key, effective at this record's
    /// sequence number.
    SetKey,
    /// Grant a recipient access to the entity.
    Grant {
        /// The recipient being granted access.
        user: AuthorId,
    },
    /// Revoke a recipient's access to the entity.
    Revoke {
        /// The recipient being revoked.
        user: AuthorId,
    },
}

/// The payload of a reassembled event.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Decrypted or never-encrypted structured payload.
    Plain(serde_json::Value),
    /// Opaque base64 ciphertext awaiting the decrypt pipeline.
    Cipher(String),
}

impl Payload {
    /// The structured payload, if plaintext.
    pub fn as_plain(&self) -> Option<&serde_json::Value> {
        match self {
            Payload::Plain(value) => Some(value),
            Payload::Cipher(_) => None,
        }
    }

    /// The base64 ciphertext, if encrypted.
    pub fn as_cipher(&self) -> Option<&str> {
        match self {
            Payload::Plain(_) => None,
            Payload::Cipher(text) => Some(text),
        }
    }
}

/// A reassembled logical event: one per sequence number, parts merged.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// The entity this event belongs to.
    pub persistence_id: PersistenceId,

    /// The event's sequence number.
    pub sequence_nr: SequenceNr,

    /// Payload manifest.
    pub manifest: String,

    /// The merged payload.
    pub payload: Payload,

    /// Whether the payload is still ciphertext.
    pub encrypted: bool,
}

impl Event {
    /// Build an event from a single unchunked record.
    ///
    /// Encrypted payloads must be strings (base64 ciphertext).
    pub fn from_record(record: WireRecord) -> Result<Self, CoreError> {
        let payload = if record.encrypted {
            match record.payload {
                serde_json::Value::String(text) => Payload::Cipher(text),
                other => {
                    return Err(CoreError::MalformedPayload(format!(
                        "encrypted payload must be a string, got {}",
                        value_kind(&other)
                    )))
                }
            }
        } else {
            Payload::Plain(record.payload)
        };

        Ok(Self {
            persistence_id: record.persistence_id,
            sequence_nr: record.sequence_nr,
            manifest: record.manifest,
            payload,
            encrypted: record.encrypted,
        })
    }
}

pub(crate) fn value_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
