//! # Cipherlog Keys
//!
//! Symmetric keys over sequence-number intervals, access lists, and
//! key-share batching.
//!
//! ## Key Model
//!
//! Each (persistence ID, author) pair carries an append-only [`KeyList`]
//! of [`KeyInterval`]s. A key covers every sequence number from its
//! `start_sequence_nr` until the next interval begins. Rotation appends;
//! nothing is ever removed, so historical events stay decryptable.
//!
//! Keys are distributed over a private channel as [`KeyShareMessage`]s, in
//! small fixed-size batches. Granting a recipient sends the *entire*
//! historical list; revoking rotates and redistributes to the remaining
//! [`AccessList`].
//!
//! ## Crypto
//!
//! Keys are stretched with PBKDF2-HMAC-SHA512; payloads are sealed with
//! ChaCha20-Poly1305, a fresh random nonce per message prepended to the
//! ciphertext. Key material is zeroized on drop.

pub mod access;
pub mod crypto;
pub mod error;
pub mod interval;
pub mod share;

pub use access::AccessList;
pub use crypto::{
    derive_key, generate_salt, open, seal, SecretKey, KDF_ITERATIONS, KDF_SALT_LEN, MAX_NONCE_LEN,
};
pub use error::{KeysError, Result};
pub use interval::{KeyInterval, KeyList};
pub use share::{
    batched, KeyShareMessage, SetKeyPayload, KEY_SHARE_TYPE, MAX_KEYS_PER_MESSAGE,
    MAX_RECIPIENTS_PER_MESSAGE,
};
