//! # cipherlog
//!
//! A per-entity, access-controlled, encrypted event journal layered on a
//! replicated append-only feed.
//!
//! ## Overview
//!
//! Each identity writes immutable records to its own feed stream; streams
//! replicate through gossip with no central broker. On top of that
//! substrate, cipherlog provides:
//!
//! - **Entity streams**: per-entity event logs addressed by persistence id,
//!   with strictly increasing sequence numbers per author
//! - **Payload encryption**: ChaCha20-Poly1305 per entity, rotated by
//!   set-key control records, with key history as interval lists
//! - **Access control**: grant and revoke records folded into per-entity
//!   access lists, keys fanned out over a private channel
//! - **Chunking**: oversized payloads split into part records that fit the
//!   feed's hard size ceiling, reassembled transparently on read
//!
//! Reads are fail-closed: an event this identity holds no key for simply
//! does not appear.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use cipherlog::{Journal, JournalConfig};
//! use cipherlog::core::{AuthorId, PersistenceId, WireRecord};
//! use cipherlog::feed::{MemoryChannel, MemoryFeed};
//! use serde_json::json;
//!
//! async fn example() {
//!     let feed = Arc::new(MemoryFeed::new());
//!     let channel = Arc::new(MemoryChannel::new());
//!     let journal = Journal::new(
//!         AuthorId::new("@alice"),
//!         feed,
//!         channel,
//!         JournalConfig::new("local-secret"),
//!     );
//!
//!     let order = PersistenceId::new("order-17");
//!     journal
//!         .persist(WireRecord::set_key(order.clone(), 1))
//!         .await
//!         .unwrap();
//!     journal
//!         .persist(WireRecord::event(order.clone(), 2, "order.Created", json!({"total": 42})))
//!         .await
//!         .unwrap();
//!
//!     let events = journal
//!         .events_by_persistence_id(None, &order, 1, u64::MAX)
//!         .await
//!         .unwrap();
//!     assert_eq!(events.len(), 2);
//! }
//! ```

pub mod config;
pub mod decrypt;
pub mod error;
pub mod indexes;
pub mod journal;

// Re-export component crates
pub use cipherlog_core as core;
pub use cipherlog_feed as feed;
pub use cipherlog_keys as keys;

// Re-export main types for convenience
pub use config::JournalConfig;
pub use decrypt::decrypt_event;
pub use error::{JournalError, Result};
pub use indexes::{AccessIndex, EntityIndex, KeyIndex};
pub use journal::Journal;

// Re-export commonly used core types
pub use cipherlog_core::{AuthorId, Event, Payload, PersistenceId, SequenceNr, Window, WireRecord};
