//! # Store Configuration
//!
//! Tunables for a `Store`, loadable from TOML:
//!
//! ```toml
//! compression_level = 9
//! stale_after_secs = 432000
//! corrupt_blob_policy = "skip"
//! default_cursor = "build_emitted"
//! ```
//!
//! Every field is optional; missing fields take the defaults from `primitives`.

use crate::StoreError;
use crate::primitives::{
    DEFAULT_COMPRESSION_LEVEL, DEFAULT_CURSOR, MAX_COMPRESSION_LEVEL, STALE_BUILD_AGE_SECS,
    is_valid_cursor_name,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// What a range scan does when a stored blob fails to decompress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CorruptBlobPolicy {
    /// Log the bad entry and continue with the rest of the range.
    #[default]
    Skip,
    /// Fail the whole scan with `StoreError::Decode`.
    Abort,
}

/// Configuration of a `Store`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    /// zlib level (0-9) for newly written blobs.
    pub compression_level: u32,
    /// Age in seconds after which an unfinished build counts as settled.
    pub stale_after_secs: u64,
    /// Behavior of blob range scans on corrupt entries.
    pub corrupt_blob_policy: CorruptBlobPolicy,
    /// Cursor used by `Store::default_cursor`.
    pub default_cursor: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            stale_after_secs: STALE_BUILD_AGE_SECS,
            corrupt_blob_policy: CorruptBlobPolicy::default(),
            default_cursor: DEFAULT_CURSOR.to_string(),
        }
    }
}

impl StoreConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self, StoreError> {
        let config: Self = toml::from_str(text).map_err(|e| StoreError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| StoreError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&text)
    }

    /// Check field ranges.
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.compression_level > MAX_COMPRESSION_LEVEL {
            return Err(StoreError::Config(format!(
                "compression_level must be 0..={}, got {}",
                MAX_COMPRESSION_LEVEL, self.compression_level
            )));
        }
        if self.stale_after_secs == 0 {
            return Err(StoreError::Config(
                "stale_after_secs must be greater than zero".to_string(),
            ));
        }
        if !is_valid_cursor_name(&self.default_cursor) {
            return Err(StoreError::InvalidCursorName(self.default_cursor.clone()));
        }
        Ok(())
    }

    /// Set the compression level.
    #[must_use]
    pub fn with_compression_level(mut self, level: u32) -> Self {
        self.compression_level = level;
        self
    }

    /// Set the staleness threshold.
    #[must_use]
    pub fn with_stale_after_secs(mut self, secs: u64) -> Self {
        self.stale_after_secs = secs;
        self
    }

    /// Set the corrupt blob policy.
    #[must_use]
    pub fn with_corrupt_blob_policy(mut self, policy: CorruptBlobPolicy) -> Self {
        self.corrupt_blob_policy = policy;
        self
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config = StoreConfig::from_toml_str("").expect("parse");
        assert_eq!(config, StoreConfig::default());
        assert_eq!(config.stale_after_secs, 432_000);
        assert_eq!(config.corrupt_blob_policy, CorruptBlobPolicy::Skip);
    }

    #[test]
    fn fields_override_defaults() {
        let config = StoreConfig::from_toml_str(
            r#"
            compression_level = 1
            corrupt_blob_policy = "abort"
            default_cursor = "make_json"
            "#,
        )
        .expect("parse");

        assert_eq!(config.compression_level, 1);
        assert_eq!(config.corrupt_blob_policy, CorruptBlobPolicy::Abort);
        assert_eq!(config.default_cursor, "make_json");
        assert_eq!(config.stale_after_secs, STALE_BUILD_AGE_SECS);
    }

    #[test]
    fn out_of_range_level_rejected() {
        let result = StoreConfig::from_toml_str("compression_level = 12");
        assert!(matches!(result, Err(StoreError::Config(_))));
    }

    #[test]
    fn zero_staleness_rejected() {
        let result = StoreConfig::from_toml_str("stale_after_secs = 0");
        assert!(matches!(result, Err(StoreError::Config(_))));
    }

    #[test]
    fn bad_default_cursor_rejected() {
        let result = StoreConfig::from_toml_str(r#"default_cursor = "no spaces""#);
        assert!(matches!(result, Err(StoreError::InvalidCursorName(_))));
    }

    #[test]
    fn unknown_field_rejected() {
        let result = StoreConfig::from_toml_str("compresion_level = 3");
        assert!(matches!(result, Err(StoreError::Config(_))));
    }

    #[test]
    fn from_file_reads_document() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("kettle.toml");
        std::fs::write(&path, "stale_after_secs = 60\n").unwrap();

        let config = StoreConfig::from_file(&path).expect("load");
        assert_eq!(config.stale_after_secs, 60);
    }
}
