//! In-memory implementations of the collaborator contracts.
//!
//! Primarily for tests. Semantics mirror the real collaborators: ordered
//! composite keys, idempotent appends, a hard size ceiling, and confirmed
//! private delivery. The channel supports failure injection so
//! distribution partial-failure paths are testable.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, RwLock};

use async_trait::async_trait;
use tokio::sync::mpsc;

use cipherlog_core::{AuthorId, WireRecord};

use crate::error::{FeedError, Result};
use crate::traits::{FeedLog, KeyedRecord, PrivateChannel, PrivateDelivery, ReadQuery, RecordKey};

/// Default serialized-envelope ceiling, matching the replicated feed's
/// hard limit.
pub const DEFAULT_MAX_RECORD_SIZE: usize = 8192;

/// In-memory replicated feed.
///
/// All data is lost when the feed is dropped. Thread-safe via RwLock; a
/// single feed instance is shared between the identities of a test.
pub struct MemoryFeed {
    max_record_size: usize,
    inner: RwLock<MemoryFeedInner>,
}

struct MemoryFeedInner {
    /// Records in composite key order.
    records: BTreeMap<RecordKey, (u64, WireRecord)>,

    /// Next global feed position.
    next_position: u64,

    /// Live followers with their range filters.
    followers: Vec<(ReadQuery, mpsc::UnboundedSender<KeyedRecord>)>,
}

impl MemoryFeed {
    /// Create an empty feed with the default size ceiling.
    pub fn new() -> Self {
        Self::with_max_record_size(DEFAULT_MAX_RECORD_SIZE)
    }

    /// Create an empty feed with a custom size ceiling.
    pub fn with_max_record_size(max_record_size: usize) -> Self {
        Self {
            max_record_size,
            inner: RwLock::new(MemoryFeedInner {
                records: BTreeMap::new(),
                next_position: 1,
                followers: Vec::new(),
            }),
        }
    }

    /// Number of raw records on the feed.
    pub fn len(&self) -> usize {
        self.inner.read().unwrap().records.len()
    }

    /// Whether the feed is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryFeed {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FeedLog for MemoryFeed {
    async fn append(&self, author: &AuthorId, record: WireRecord) -> Result<u64> {
        let size = record.serialized_len();
        if size > self.max_record_size {
            return Err(FeedError::RecordTooLarge {
                size,
                limit: self.max_record_size,
            });
        }

        let key = RecordKey::for_record(author.clone(), &record);
        let mut inner = self.inner.write().unwrap();

        if let Some((position, _)) = inner.records.get(&key) {
            return Ok(*position);
        }

        let position = inner.next_position;
        inner.next_position += 1;
        inner.records.insert(key.clone(), (position, record.clone()));

        let delivered = KeyedRecord {
            key: key.clone(),
            position,
            record,
        };
        inner
            .followers
            .retain(|(query, sender)| !query.matches(&key) || sender.send(delivered.clone()).is_ok());

        Ok(position)
    }

    async fn read(&self, query: ReadQuery) -> Result<Vec<KeyedRecord>> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .records
            .iter()
            .filter(|(key, _)| query.matches(key))
            .map(|(key, (position, record))| KeyedRecord {
                key: key.clone(),
                position: *position,
                record: record.clone(),
            })
            .collect())
    }

    fn follow(&self, query: ReadQuery) -> mpsc::UnboundedReceiver<KeyedRecord> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let mut inner = self.inner.write().unwrap();

        // Backlog first, in key order, then live updates.
        for (key, (position, record)) in &inner.records {
            if query.matches(key) {
                let _ = sender.send(KeyedRecord {
                    key: key.clone(),
                    position: *position,
                    record: record.clone(),
                });
            }
        }
        inner.followers.push((query, sender));

        receiver
    }
}

/// In-memory private channel with per-recipient inboxes.
pub struct MemoryChannel {
    inner: Mutex<MemoryChannelInner>,
}

struct MemoryChannelInner {
    inboxes: HashMap<AuthorId, Vec<PrivateDelivery>>,
    /// Successful sends so far, for failure injection.
    sent: usize,
    /// Fail every send once `sent` reaches this count.
    fail_after: Option<usize>,
}

impl MemoryChannel {
    /// Create an empty channel.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(MemoryChannelInner {
                inboxes: HashMap::new(),
                sent: 0,
                fail_after: None,
            }),
        }
    }

    /// Make every send fail once `count` sends have succeeded.
    pub fn fail_after(&self, count: usize) {
        self.inner.lock().unwrap().fail_after = Some(count);
    }

    /// Clear failure injection.
    pub fn heal(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_after = None;
    }

    /// Number of successful sends.
    pub fn sent_count(&self) -> usize {
        self.inner.lock().unwrap().sent
    }
}

impl Default for MemoryChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PrivateChannel for MemoryChannel {
    async fn send(
        &self,
        sender: &AuthorId,
        message: serde_json::Value,
        recipients: &[AuthorId],
    ) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();

        if let Some(limit) = inner.fail_after {
            if inner.sent >= limit {
                return Err(FeedError::DeliveryFailed(format!(
                    "injected failure after {limit} sends"
                )));
            }
        }

        for recipient in recipients {
            inner
                .inboxes
                .entry(recipient.clone())
                .or_default()
                .push(PrivateDelivery {
                    sender: sender.clone(),
                    message: message.clone(),
                });
        }
        inner.sent += 1;

        Ok(())
    }

    async fn inbox(&self, recipient: &AuthorId) -> Result<Vec<PrivateDelivery>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.inboxes.get(recipient).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cipherlog_core::PersistenceId;
    use serde_json::json;

    fn record(pid: &str, seq: u64) -> WireRecord {
        WireRecord::event(PersistenceId::new(pid), seq, "app.Evt", json!({"n": seq}))
    }

    #[tokio::test]
    async fn test_append_and_read_in_key_order() {
        let feed = MemoryFeed::new();
        let author = AuthorId::new("@a");

        feed.append(&author, record("e", 2)).await.unwrap();
        feed.append(&author, record("e", 1)).await.unwrap();

        let all = feed.read(ReadQuery::all()).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].record.sequence_nr, 1);
        assert_eq!(all[1].record.sequence_nr, 2);
    }

    #[tokio::test]
    async fn test_append_is_idempotent() {
        let feed = MemoryFeed::new();
        let author = AuthorId::new("@a");

        let first = feed.append(&author, record("e", 1)).await.unwrap();
        let second = feed.append(&author, record("e", 1)).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(feed.len(), 1);
    }

    #[tokio::test]
    async fn test_size_ceiling_enforced() {
        let feed = MemoryFeed::with_max_record_size(64);
        let author = AuthorId::new("@a");
        let oversized = WireRecord::event(
            PersistenceId::new("e"),
            1,
            "app.Evt",
            json!({ "text": "x".repeat(200) }),
        );

        let result = feed.append(&author, oversized).await;
        assert!(matches!(result, Err(FeedError::RecordTooLarge { .. })));
    }

    #[tokio::test]
    async fn test_range_read() {
        let feed = MemoryFeed::new();
        let author = AuthorId::new("@a");
        for seq in 1..=5 {
            feed.append(&author, record("e", seq)).await.unwrap();
        }

        let pid = PersistenceId::new("e");
        let page = feed
            .read(ReadQuery::entity_range(&author, &pid, 2, 4))
            .await
            .unwrap();
        let seqs: Vec<u64> = page.iter().map(|r| r.record.sequence_nr).collect();
        assert_eq!(seqs, vec![2, 3, 4]);
    }

    #[tokio::test]
    async fn test_follow_gets_backlog_then_live() {
        let feed = MemoryFeed::new();
        let author = AuthorId::new("@a");
        feed.append(&author, record("e", 1)).await.unwrap();

        let mut follower = feed.follow(ReadQuery::all());
        let backlog = follower.recv().await.unwrap();
        assert_eq!(backlog.record.sequence_nr, 1);

        feed.append(&author, record("e", 2)).await.unwrap();
        let live = follower.recv().await.unwrap();
        assert_eq!(live.record.sequence_nr, 2);
    }

    #[tokio::test]
    async fn test_channel_delivery_and_inbox() {
        let channel = MemoryChannel::new();
        let sender = AuthorId::new("@piet");
        let katie = AuthorId::new("@katie");

        channel
            .send(&sender, json!({"hello": true}), &[katie.clone(), sender.clone()])
            .await
            .unwrap();

        let inbox = channel.inbox(&katie).await.unwrap();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].sender, sender);

        // Self-delivery landed too.
        assert_eq!(channel.inbox(&sender).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_channel_failure_injection() {
        let channel = MemoryChannel::new();
        channel.fail_after(1);
        let sender = AuthorId::new("@piet");
        let recipient = [AuthorId::new("@katie")];

        assert!(channel.send(&sender, json!(1), &recipient).await.is_ok());
        assert!(channel.send(&sender, json!(2), &recipient).await.is_err());

        channel.heal();
        assert!(channel.send(&sender, json!(3), &recipient).await.is_ok());
    }
}
