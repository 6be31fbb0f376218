//! Validation of persisted records.
//!
//! Every record passes through here before it can touch an index or the
//! feed. Sequence monotonicity is the caller's contract and is not
//! re-checked beyond the 1-based floor.

use crate::error::ValidationError;
use crate::record::{
    value_kind, WireRecord, MANIFEST_ADD_USER, MANIFEST_REMOVE_USER, RECORD_TYPE,
};

/// Validate the structure of a record.
pub fn validate_record(record: &WireRecord) -> Result<(), ValidationError> {
    if record.record_type != RECORD_TYPE {
        return Err(ValidationError::WrongType {
            expected: RECORD_TYPE,
            got: record.record_type.clone(),
        });
    }

    if record.persistence_id.as_str().is_empty() {
        return Err(ValidationError::MissingPersistenceId);
    }

    if record.manifest.is_empty() {
        return Err(ValidationError::MissingManifest);
    }

    if record.sequence_nr == 0 {
        return Err(ValidationError::ZeroSequenceNr);
    }

    match (record.part, record.of) {
        (None, None) => {}
        (Some(part), Some(of)) => {
            if part == 0 || of == 0 || part > of {
                return Err(ValidationError::InvalidPartIndex { part, of });
            }
        }
        _ => return Err(ValidationError::UnpairedPart),
    }

    // Grant/revoke records must name their recipient; a control record
    // without one would silently corrupt the access index on replay.
    if matches!(
        record.manifest.as_str(),
        MANIFEST_ADD_USER | MANIFEST_REMOVE_USER
    ) {
        let missing = record
            .user_id
            .as_ref()
            .map(|user| user.as_str().is_empty())
            .unwrap_or(true);
        if missing {
            return Err(ValidationError::ControlMissingUser {
                manifest: record.manifest.clone(),
            });
        }
    }

    if record.encrypted && !record.payload.is_string() {
        return Err(ValidationError::NonStringCiphertext(value_kind(
            &record.payload,
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AuthorId, PersistenceId};
    use serde_json::json;

    fn valid_record() -> WireRecord {
        WireRecord::event(PersistenceId::new("e"), 1, "app.Evt", json!({"a": 1}))
    }

    #[test]
    fn test_valid_record_passes() {
        assert!(validate_record(&valid_record()).is_ok());
    }

    #[test]
    fn test_wrong_type_rejected() {
        let mut record = valid_record();
        record.record_type = "something-else".to_string();
        assert!(matches!(
            validate_record(&record),
            Err(ValidationError::WrongType { .. })
        ));
    }

    #[test]
    fn test_empty_persistence_id_rejected() {
        let mut record = valid_record();
        record.persistence_id = PersistenceId::new("");
        assert!(matches!(
            validate_record(&record),
            Err(ValidationError::MissingPersistenceId)
        ));
    }

    #[test]
    fn test_zero_sequence_rejected() {
        let mut record = valid_record();
        record.sequence_nr = 0;
        assert!(matches!(
            validate_record(&record),
            Err(ValidationError::ZeroSequenceNr)
        ));
    }

    #[test]
    fn test_unpaired_part_rejected() {
        let mut record = valid_record();
        record.part = Some(1);
        assert!(matches!(
            validate_record(&record),
            Err(ValidationError::UnpairedPart)
        ));
    }

    #[test]
    fn test_part_beyond_of_rejected() {
        let mut record = valid_record();
        record.part = Some(4);
        record.of = Some(3);
        assert!(matches!(
            validate_record(&record),
            Err(ValidationError::InvalidPartIndex { part: 4, of: 3 })
        ));
    }

    #[test]
    fn test_grant_without_user_rejected() {
        let mut record = WireRecord::grant(PersistenceId::new("e"), 2, AuthorId::new("@k"));
        record.user_id = None;
        assert!(matches!(
            validate_record(&record),
            Err(ValidationError::ControlMissingUser { .. })
        ));
    }

    #[test]
    fn test_encrypted_non_string_payload_rejected() {
        let mut record = valid_record();
        record.encrypted = true;
        assert!(matches!(
            validate_record(&record),
            Err(ValidationError::NonStringCiphertext("object"))
        ));
    }
}
