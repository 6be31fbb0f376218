//! # cipherlog testkit
//!
//! Testing utilities for cipherlog.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: a shared in-memory feed and private channel that
//!   several journal identities sit on, for multi-party scenarios
//! - **Generators**: proptest strategies for records, identities, and
//!   key material
//!
//! ## Test Fixtures
//!
//! ```rust
//! use cipherlog_testkit::TestNetwork;
//!
//! let network = TestNetwork::new();
//! let alice = network.journal("@alice");
//! let bob = network.journal("@bob");
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use cipherlog_testkit::generators::event_record;
//!
//! proptest! {
//!     #[test]
//!     fn records_survive_serialization(record in event_record()) {
//!         let json = serde_json::to_string(&record).unwrap();
//!         let back = serde_json::from_str(&json).unwrap();
//!         prop_assert_eq!(record, back);
//!     }
//! }
//! ```

pub mod fixtures;
pub mod generators;

pub use fixtures::{event_record, large_payload, TestNetwork};
