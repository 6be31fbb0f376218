//! Key intervals: symmetric keys valid over sequence-number ranges.
//!
//! A key list belongs to one (persistence ID, author) pair and only ever
//! grows. Rotation appends a new interval; no interval is removed, so
//! events decryptable today stay decryptable after any number of
//! rotations.

use serde::{Deserialize, Serialize};

use crate::crypto::SecretKey;

/// A symmetric key valid from `start_sequence_nr` until superseded by the
/// next interval in the list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyInterval {
    /// First sequence number this key covers.
    pub start_sequence_nr: u64,

    /// The symmetric key (base64 on the wire).
    pub key: SecretKey,

    /// Stored nonce length for payloads sealed under this key.
    pub nonce_length: usize,
}

impl KeyInterval {
    /// Create a new interval.
    pub fn new(start_sequence_nr: u64, key: SecretKey, nonce_length: usize) -> Self {
        Self {
            start_sequence_nr,
            key,
            nonce_length,
        }
    }
}

/// Append-only ordered list of key intervals for one (persistence ID,
/// author) pair.
///
/// `start_sequence_nr` values are unique and strictly increasing. Inserts
/// deduplicate by start, so replaying the same key-share delivery twice is
/// a no-op.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyList {
    intervals: Vec<KeyInterval>,
}

impl KeyList {
    /// Create an empty key list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an interval, keeping the list ordered by start.
    ///
    /// Returns false when an interval with the same `start_sequence_nr`
    /// already exists (idempotent replay of duplicate deliveries).
    pub fn insert(&mut self, interval: KeyInterval) -> bool {
        match self
            .intervals
            .binary_search_by_key(&interval.start_sequence_nr, |i| i.start_sequence_nr)
        {
            Ok(_) => false,
            Err(position) => {
                self.intervals.insert(position, interval);
                true
            }
        }
    }

    /// Merge a batch of intervals (e.g. one key-share delivery).
    pub fn merge(&mut self, intervals: impl IntoIterator<Item = KeyInterval>) {
        for interval in intervals {
            self.insert(interval);
        }
    }

    /// The interval covering `sequence_nr`: the one with the greatest
    /// `start_sequence_nr <= sequence_nr`.
    ///
    /// `None` means the sequence number pre-dates the earliest key; the
    /// caller cannot decrypt, which is not an error.
    pub fn key_for_sequence_nr(&self, sequence_nr: u64) -> Option<&KeyInterval> {
        self.intervals
            .iter()
            .take_while(|interval| interval.start_sequence_nr <= sequence_nr)
            .last()
    }

    /// The newest key, used to encrypt new events.
    pub fn current(&self) -> Option<&KeyInterval> {
        self.intervals.last()
    }

    /// All intervals in start order.
    pub fn iter(&self) -> impl Iterator<Item = &KeyInterval> {
        self.intervals.iter()
    }

    /// All intervals, consumed.
    pub fn into_intervals(self) -> Vec<KeyInterval> {
        self.intervals
    }

    /// Number of intervals.
    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    /// Whether the list holds no keys.
    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }
}

impl FromIterator<KeyInterval> for KeyList {
    fn from_iter<I: IntoIterator<Item = KeyInterval>>(iter: I) -> Self {
        let mut list = KeyList::new();
        list.merge(iter);
        list
    }
}
