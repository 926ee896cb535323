//! # Blob Codec
//!
//! Artifact payloads are stored zlib-compressed. The codec is pure: no table
//! access, no logging.

use crate::StoreError;
use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use std::io::{Read, Write};

/// Compress `raw` at the given zlib level (0-9).
pub fn compress_blob(raw: &[u8], level: u32) -> Result<Vec<u8>, StoreError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::new(level));
    encoder
        .write_all(raw)
        .map_err(|e| StoreError::Encode(e.to_string()))?;
    encoder
        .finish()
        .map_err(|e| StoreError::Encode(e.to_string()))
}

/// Decompress a stored blob.
///
/// Truncated or otherwise corrupt input is a `StoreError::Decode`.
pub fn decompress_blob(stored: &[u8]) -> Result<Vec<u8>, StoreError> {
    let mut decoder = ZlibDecoder::new(stored);
    let mut raw = Vec::new();
    decoder
        .read_to_end(&mut raw)
        .map_err(|e| StoreError::Decode(format!("corrupt blob: {}", e)))?;
    Ok(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn junit_payload_survives_codec() {
        let raw = b"<testsuite tests=\"2\"><testcase name=\"a\"/></testsuite>".repeat(20);
        let stored = compress_blob(&raw, 9).expect("compress");

        assert!(stored.len() < raw.len());
        assert_eq!(decompress_blob(&stored).expect("decompress"), raw);
    }

    #[test]
    fn empty_payload_is_valid() {
        let stored = compress_blob(b"", 9).expect("compress");
        assert!(decompress_blob(&stored).expect("decompress").is_empty());
    }

    #[test]
    fn garbage_is_decode_error() {
        let result = decompress_blob(b"definitely not zlib");
        assert!(matches!(result, Err(StoreError::Decode(_))));
    }
}
