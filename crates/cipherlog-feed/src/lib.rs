//! # Cipherlog Feed
//!
//! Contracts for the external collaborators cipherlog builds on: the
//! replicated append-only feed and the private message channel. Both are
//! assumed reliable and provided externally; this crate fixes their
//! interfaces and ships in-memory implementations for tests.
//!
//! ## Key Types
//!
//! - [`FeedLog`] - Async trait over the ordered, size-capped feed
//! - [`PrivateChannel`] - Async trait over confirmed private delivery
//! - [`RecordKey`] - The (author, persistence ID, sequence nr, part)
//!   composite ordering
//! - [`MemoryFeed`] / [`MemoryChannel`] - In-memory test doubles

pub mod error;
pub mod memory;
pub mod traits;

pub use error::{FeedError, Result};
pub use memory::{MemoryChannel, MemoryFeed, DEFAULT_MAX_RECORD_SIZE};
pub use traits::{FeedLog, KeyedRecord, PrivateChannel, PrivateDelivery, ReadQuery, RecordKey};
