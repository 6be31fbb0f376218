//! Collaborator contracts: the replicated append-only feed and the
//! private message channel.
//!
//! Both are provided externally; this crate only fixes the interfaces the
//! core needs. Appends are signed, ordered per author, and immutable once
//! committed — all of that is the collaborator's responsibility.

use async_trait::async_trait;
use tokio::sync::mpsc;

use cipherlog_core::{AuthorId, PersistenceId, SequenceNr, WireRecord};

use crate::error::Result;

/// The composite ordering key over persisted records.
///
/// Lexicographic over (author, persistence ID, sequence number, part), so
/// parts of one event are contiguous and `part` ascends within an event.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordKey {
    pub author: AuthorId,
    pub persistence_id: PersistenceId,
    pub sequence_nr: SequenceNr,
    pub part: u32,
}

impl RecordKey {
    /// The key under which a record sorts (unchunked records sort as
    /// part 1).
    pub fn for_record(author: AuthorId, record: &WireRecord) -> Self {
        Self {
            author,
            persistence_id: record.persistence_id.clone(),
            sequence_nr: record.sequence_nr,
            part: record.part.unwrap_or(1),
        }
    }
}

/// A bounded or open range over the composite key space.
#[derive(Debug, Clone, Default)]
pub struct ReadQuery {
    /// Inclusive lower bound.
    pub gte: Option<RecordKey>,
    /// Inclusive upper bound.
    pub lte: Option<RecordKey>,
}

impl ReadQuery {
    /// Everything on the feed.
    pub fn all() -> Self {
        Self::default()
    }

    /// All records for one (author, entity) pair within a sequence range.
    pub fn entity_range(
        author: &AuthorId,
        persistence_id: &PersistenceId,
        from_sequence_nr: SequenceNr,
        to_sequence_nr: SequenceNr,
    ) -> Self {
        Self {
            gte: Some(RecordKey {
                author: author.clone(),
                persistence_id: persistence_id.clone(),
                sequence_nr: from_sequence_nr,
                part: 0,
            }),
            lte: Some(RecordKey {
                author: author.clone(),
                persistence_id: persistence_id.clone(),
                sequence_nr: to_sequence_nr,
                part: u32::MAX,
            }),
        }
    }

    /// Whether a key falls within the query bounds.
    pub fn matches(&self, key: &RecordKey) -> bool {
        if let Some(gte) = &self.gte {
            if key < gte {
                return false;
            }
        }
        if let Some(lte) = &self.lte {
            if key > lte {
                return false;
            }
        }
        true
    }
}

/// A record as delivered by the feed: composite key, global feed
/// position, and the stored envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyedRecord {
    /// The record's composite key.
    pub key: RecordKey,
    /// The feed position assigned at append time.
    pub position: u64,
    /// The stored record.
    pub record: WireRecord,
}

/// The replicated append-only log.
///
/// Ordered per author, immutable once committed, with a hard size ceiling
/// per serialized message.
#[async_trait]
pub trait FeedLog: Send + Sync {
    /// Append a record as `author`. Returns the assigned feed position.
    ///
    /// Appending a record whose composite key already exists is
    /// idempotent and returns the existing position.
    async fn append(&self, author: &AuthorId, record: WireRecord) -> Result<u64>;

    /// Read a bounded range in composite key order.
    async fn read(&self, query: ReadQuery) -> Result<Vec<KeyedRecord>>;

    /// Live-follow a range: the current backlog in key order, then every
    /// matching append as it lands. Dropping the receiver unsubscribes.
    fn follow(&self, query: ReadQuery) -> mpsc::UnboundedReceiver<KeyedRecord>;
}

/// A privately delivered message as seen by one recipient.
#[derive(Debug, Clone, PartialEq)]
pub struct PrivateDelivery {
    /// Who sent it.
    pub sender: AuthorId,
    /// The decrypted content.
    pub message: serde_json::Value,
}

/// The private message channel.
///
/// End-to-end encryption between sender and recipients is the
/// collaborator's concern, distinct from cipherlog's own payload
/// encryption.
#[async_trait]
pub trait PrivateChannel: Send + Sync {
    /// Deliver a message to a set of recipients. Resolves only once
    /// delivery is confirmed.
    async fn send(
        &self,
        sender: &AuthorId,
        message: serde_json::Value,
        recipients: &[AuthorId],
    ) -> Result<()>;

    /// Everything delivered to `recipient`, in delivery order.
    async fn inbox(&self, recipient: &AuthorId) -> Result<Vec<PrivateDelivery>>;
}
