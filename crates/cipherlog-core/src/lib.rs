//! # Cipherlog Core
//!
//! Pure primitives for cipherlog: wire records, control-event
//! classification, chunking/reassembly, validation, and pagination.
//!
//! This crate contains no I/O, no storage, no networking. It is pure
//! computation over the persisted record shape.
//!
//! ## Key Types
//!
//! - [`WireRecord`] - The persisted record shape on the external feed
//! - [`Event`] - A reassembled logical event
//! - [`ControlEvent`] - Closed set of control manifests (set-key, grant, revoke)
//! - [`Reassembler`] - Single-window part merger over a key-ordered stream
//!
//! ## Chunking
//!
//! Oversized payloads are split with JSON-escape-aware sizing. See
//! [`chunk`] for the splitting rules.

pub mod chunk;
pub mod error;
pub mod paging;
pub mod record;
pub mod types;
pub mod validation;

pub use chunk::{chunk_record, escaped_len, split_payload, Reassembler};
pub use error::{CoreError, ValidationError};
pub use paging::{paginate, Window};
pub use record::{
    ControlEvent, Event, Payload, WireRecord, MANIFEST_ADD_USER, MANIFEST_REMOVE_USER,
    MANIFEST_SET_KEY, RECORD_TYPE,
};
pub use types::{AuthorId, PersistenceId, SequenceNr};
pub use validation::validate_record;
