//! Error types for cipherlog core.

use thiserror::Error;

/// Errors from pure record and reassembly operations.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    #[error("malformed part run: {0}")]
    MalformedPartRun(String),

    #[error("payload parse failed: {0}")]
    PayloadParse(#[from] serde_json::Error),
}

/// Validation errors for persisted records.
///
/// Rejected before any index or append is touched, so a malformed control
/// record can never corrupt the key or access indexes.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("wrong record type: expected {expected}, got {got}")]
    WrongType { expected: &'static str, got: String },

    #[error("missing persistence ID")]
    MissingPersistenceId,

    #[error("missing manifest")]
    MissingManifest,

    #[error("sequence number must be >= 1")]
    ZeroSequenceNr,

    #[error("part and of must be present together")]
    UnpairedPart,

    #[error("invalid part index: part {part} of {of}")]
    InvalidPartIndex { part: u32, of: u32 },

    #[error("control record {manifest} is missing its user ID")]
    ControlMissingUser { manifest: String },

    #[error("encrypted payload must be a base64 string, got {0}")]
    NonStringCiphertext(&'static str),
}
