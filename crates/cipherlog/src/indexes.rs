//! Derived views folded from the feed and the private inbox.
//!
//! None of these are persisted. Each is a deterministic fold over an ordered
//! input, so rebuilding one from scratch always yields the same view, and a
//! partially replicated feed simply yields the fold of what has arrived.

use std::collections::{BTreeSet, HashMap};

use cipherlog_core::{AuthorId, ControlEvent, PersistenceId};
use cipherlog_feed::{KeyedRecord, PrivateDelivery};
use cipherlog_keys::{AccessList, KeyList, KeyShareMessage};

/// Which authors write which entities, folded from first-sequence records.
///
/// An entity enters the index exactly once per author, when that author's
/// record at sequence number one is seen. The encrypted flag of that first
/// record classifies the whole stream, since a set-key at sequence one is
/// the only way an entity starts encrypted.
#[derive(Debug, Default)]
pub struct EntityIndex {
    by_author: BTreeSet<(AuthorId, bool, PersistenceId)>,
    by_entity: BTreeSet<(PersistenceId, bool, AuthorId)>,
}

impl EntityIndex {
    pub fn fold<'a>(records: impl IntoIterator<Item = &'a KeyedRecord>) -> Self {
        let mut index = Self::default();
        for keyed in records {
            index.observe(keyed);
        }
        index
    }

    pub fn observe(&mut self, keyed: &KeyedRecord) {
        // Only the first chunk of a chunked first record counts.
        if keyed.record.sequence_nr != 1 || keyed.record.part.unwrap_or(1) != 1 {
            return;
        }
        let author = keyed.key.author.clone();
        let pid = keyed.record.persistence_id.clone();
        let encrypted = keyed.record.encrypted;
        self.by_author.insert((author.clone(), encrypted, pid.clone()));
        self.by_entity.insert((pid, encrypted, author));
    }

    /// Entities written by `author`, with their encrypted flag, in id order.
    pub fn persistence_ids_for<'a>(
        &'a self,
        author: &AuthorId,
    ) -> impl Iterator<Item = (bool, &'a PersistenceId)> + 'a {
        let author = author.clone();
        self.by_author
            .iter()
            .filter(move |(a, _, _)| *a == author)
            .map(|(_, encrypted, pid)| (*encrypted, pid))
    }

    /// Authors of `persistence_id`, with their encrypted flag, in id order.
    pub fn authors_for<'a>(
        &'a self,
        persistence_id: &PersistenceId,
    ) -> impl Iterator<Item = (bool, &'a AuthorId)> + 'a {
        let persistence_id = persistence_id.clone();
        self.by_entity
            .iter()
            .filter(move |(pid, _, _)| *pid == persistence_id)
            .map(|(_, encrypted, author)| (*encrypted, author))
    }

    /// Every (author, encrypted, persistence id) entry, in author order.
    pub fn entries(&self) -> impl Iterator<Item = &(AuthorId, bool, PersistenceId)> {
        self.by_author.iter()
    }
}

/// Key material this identity holds, folded from its private inbox.
///
/// Lists are keyed by entity and sender, so two authors sharing one
/// persistence id keep independent key histories. Merging is idempotent and
/// first-delivery-wins per start sequence number, which makes redelivered
/// key-share messages harmless.
#[derive(Debug, Default)]
pub struct KeyIndex {
    lists: HashMap<(PersistenceId, AuthorId), KeyList>,
}

impl KeyIndex {
    pub fn fold<'a>(deliveries: impl IntoIterator<Item = &'a PrivateDelivery>) -> Self {
        let mut index = Self::default();
        for delivery in deliveries {
            index.observe(delivery);
        }
        index
    }

    pub fn observe(&mut self, delivery: &PrivateDelivery) {
        if !KeyShareMessage::is_key_share(&delivery.message) {
            return;
        }
        let message: KeyShareMessage = match serde_json::from_value(delivery.message.clone()) {
            Ok(message) => message,
            Err(err) => {
                tracing::debug!(
                    sender = %delivery.sender,
                    error = %err,
                    "malformed key-share message, skipping"
                );
                return;
            }
        };
        self.lists
            .entry((message.persistence_id, delivery.sender.clone()))
            .or_default()
            .merge(message.keys);
    }

    /// Keys held for `persistence_id` as written by `author`.
    pub fn keys_for(&self, persistence_id: &PersistenceId, author: &AuthorId) -> Option<&KeyList> {
        self.lists
            .get(&(persistence_id.clone(), author.clone()))
            .filter(|list| !list.is_empty())
    }

    /// Whether any key material exists for this entity and author.
    pub fn has_any_key(&self, persistence_id: &PersistenceId, author: &AuthorId) -> bool {
        self.keys_for(persistence_id, author).is_some()
    }
}

/// Who currently holds access to each of our entities, folded from our own
/// grant and revoke records in feed order.
#[derive(Debug, Default)]
pub struct AccessIndex {
    lists: HashMap<PersistenceId, AccessList>,
}

impl AccessIndex {
    pub fn fold<'a>(
        owner: &AuthorId,
        records: impl IntoIterator<Item = &'a KeyedRecord>,
    ) -> Self {
        let mut index = Self::default();
        for keyed in records {
            if &keyed.key.author != owner {
                continue;
            }
            index.observe(&keyed.record);
        }
        index
    }

    pub fn observe(&mut self, record: &cipherlog_core::WireRecord) {
        match record.control_event() {
            Some(ControlEvent::Grant { user }) => {
                self.lists
                    .entry(record.persistence_id.clone())
                    .or_default()
                    .grant(user);
            }
            Some(ControlEvent::Revoke { user }) => {
                self.lists
                    .entry(record.persistence_id.clone())
                    .or_default()
                    .revoke(&user);
            }
            _ => {}
        }
    }

    /// The folded access list for an entity, empty when nothing was granted.
    pub fn access_list_for(&self, persistence_id: &PersistenceId) -> AccessList {
        self.lists.get(persistence_id).cloned().unwrap_or_default()
    }
}
