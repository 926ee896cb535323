//! # Build Record Format
//!
//! Rows of the `builds` table are a one-byte format version followed by the
//! postcard-serialized `BuildRecord`.
//!
//! The version byte is checked before the payload is parsed so that a store
//! written by a newer release fails loudly instead of decoding garbage.

use crate::{BuildRecord, StoreError};

/// Current row format version.
///
/// Increment this when making breaking changes to `BuildRecord`.
pub const RECORD_VERSION: u8 = 1;

/// Encode a build record for the `builds` table.
pub fn record_to_bytes(record: &BuildRecord) -> Result<Vec<u8>, StoreError> {
    let payload = postcard::to_stdvec(record).map_err(|e| StoreError::Encode(e.to_string()))?;

    let mut bytes = Vec::with_capacity(1 + payload.len());
    bytes.push(RECORD_VERSION);
    bytes.extend_from_slice(&payload);
    Ok(bytes)
}

/// Decode a row of the `builds` table.
pub fn record_from_bytes(bytes: &[u8]) -> Result<BuildRecord, StoreError> {
    let Some((&version, payload)) = bytes.split_first() else {
        return Err(StoreError::Decode("empty build record".to_string()));
    };
    if version != RECORD_VERSION {
        return Err(StoreError::Decode(format!(
            "unsupported build record version: {} (expected {})",
            version, RECORD_VERSION
        )));
    }
    postcard::from_bytes(payload)
        .map_err(|e| StoreError::Decode(format!("failed to decode build record: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> BuildRecord {
        BuildRecord {
            path: "gs://logs/ci-unit/7".to_string(),
            started_json: Some(r#"{"timestamp":100}"#.to_string()),
            finished_json: None,
            finished_time: None,
        }
    }

    #[test]
    fn bytes_start_with_version() {
        let bytes = record_to_bytes(&record()).expect("encode");
        assert_eq!(bytes[0], RECORD_VERSION);
        assert_eq!(record_from_bytes(&bytes).expect("decode"), record());
    }

    #[test]
    fn unknown_version_rejected() {
        let mut bytes = record_to_bytes(&record()).expect("encode");
        bytes[0] = RECORD_VERSION + 1;
        assert!(matches!(
            record_from_bytes(&bytes),
            Err(StoreError::Decode(_))
        ));
    }

    #[test]
    fn empty_row_rejected() {
        assert!(matches!(record_from_bytes(&[]), Err(StoreError::Decode(_))));
    }
}
