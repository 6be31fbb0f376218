//! Test fixtures and helpers.
//!
//! Common setup code for integration tests: a shared in-memory substrate
//! that several journal identities sit on, plus record builders.

use std::sync::Arc;

use cipherlog::{Journal, JournalConfig};
use cipherlog_core::{AuthorId, PersistenceId, WireRecord};
use cipherlog_feed::{MemoryChannel, MemoryFeed};
use serde_json::json;

/// A shared in-memory feed and private channel.
///
/// All journals created from one network see the same replicated records
/// and deliver key shares to each other, which is exactly the multi-party
/// topology grant and revoke scenarios need.
pub struct TestNetwork {
    pub feed: Arc<MemoryFeed>,
    pub channel: Arc<MemoryChannel>,
}

impl TestNetwork {
    pub fn new() -> Self {
        Self {
            feed: Arc::new(MemoryFeed::new()),
            channel: Arc::new(MemoryChannel::new()),
        }
    }

    /// A network whose feed rejects records above `max_record_size`.
    pub fn with_max_record_size(max_record_size: usize) -> Self {
        Self {
            feed: Arc::new(MemoryFeed::with_max_record_size(max_record_size)),
            channel: Arc::new(MemoryChannel::new()),
        }
    }

    /// A journal for `author` with a per-identity key secret.
    pub fn journal(&self, author: &str) -> Journal<MemoryFeed, MemoryChannel> {
        self.journal_with_config(author, JournalConfig::new(format!("secret-of-{author}")))
    }

    /// A journal for `author` with explicit configuration.
    pub fn journal_with_config(
        &self,
        author: &str,
        config: JournalConfig,
    ) -> Journal<MemoryFeed, MemoryChannel> {
        Journal::new(
            AuthorId::new(author),
            Arc::clone(&self.feed),
            Arc::clone(&self.channel),
            config,
        )
    }
}

impl Default for TestNetwork {
    fn default() -> Self {
        Self::new()
    }
}

/// A plain domain event record.
pub fn event_record(pid: &str, seq: u64, payload: serde_json::Value) -> WireRecord {
    WireRecord::event(PersistenceId::new(pid), seq, "test.Event", payload)
}

/// A payload whose serialized form is roughly `len` bytes, for chunking
/// scenarios.
pub fn large_payload(len: usize) -> serde_json::Value {
    json!({ "blob": "x".repeat(len) })
}
