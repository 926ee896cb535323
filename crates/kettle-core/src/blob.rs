//! # Blob Store
//!
//! Keyed storage for compressed opaque payloads.
//!
//! A blob path is stored as a two-level key: the parent directory and the leaf
//! name (`logs/ci-unit/7/artifacts/junit_01.xml` becomes
//! `("logs/ci-unit/7/artifacts", "junit_01.xml")`). Range scans walk parents
//! in key order and stop at the first parent that no longer shares the prefix,
//! so no upper-bound sentinel character is needed and `b10/x` never shows up
//! under `b1`.

use crate::config::CorruptBlobPolicy;
use crate::formats::{compress_blob, decompress_blob};
use crate::primitives::PATH_SEPARATOR;
use crate::storage::tables::BLOBS;
use crate::storage::{IngestWriter, Store};
use crate::{BlobEntry, StoreError};
use redb::{ReadableDatabase, ReadableTable};

/// `(parent, leaf)` split of a blob path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct BlobKey {
    pub(crate) parent: String,
    pub(crate) leaf: String,
}

impl BlobKey {
    /// Split `path` at its last separator.
    ///
    /// Rejects empty paths and paths ending in a separator.
    pub(crate) fn parse(path: &str) -> Result<Self, StoreError> {
        if path.is_empty() || path.ends_with(PATH_SEPARATOR) {
            return Err(StoreError::InvalidPath(path.to_string()));
        }
        let (parent, leaf) = path.rsplit_once(PATH_SEPARATOR).unwrap_or(("", path));
        Ok(Self {
            parent: parent.to_string(),
            leaf: leaf.to_string(),
        })
    }
}

/// Rebuild the full path of a stored blob.
fn join(parent: &str, leaf: &str) -> String {
    if parent.is_empty() {
        leaf.to_string()
    } else {
        format!("{parent}{PATH_SEPARATOR}{leaf}")
    }
}

/// Whether `parent` is `prefix` itself or a directory below it.
fn is_beneath(prefix: &str, parent: &str) -> bool {
    prefix.is_empty()
        || parent
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with(PATH_SEPARATOR))
}

impl IngestWriter<'_> {
    /// Store `raw` compressed under `path`, replacing any previous value.
    pub fn put_blob(&mut self, path: &str, raw: &[u8]) -> Result<(), StoreError> {
        let key = BlobKey::parse(path)?;
        let stored = compress_blob(raw, self.store.config.compression_level)?;

        let write_txn = self.store.db.begin_write()?;
        {
            let mut blobs_table = write_txn.open_table(BLOBS)?;
            blobs_table.insert((key.parent.as_str(), key.leaf.as_str()), stored.as_slice())?;
        }
        write_txn.commit()?;

        tracing::debug!(path, bytes = raw.len(), "stored blob");
        Ok(())
    }
}

impl Store {
    /// Fetch and decompress a single blob.
    pub fn blob(&self, path: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let key = BlobKey::parse(path)?;
        let read_txn = self.db.begin_read()?;
        let blobs_table = read_txn.open_table(BLOBS)?;
        match blobs_table.get((key.parent.as_str(), key.leaf.as_str()))? {
            Some(stored) => Ok(Some(decompress_blob(stored.value())?)),
            None => Ok(None),
        }
    }

    /// Every non-empty blob at or below `prefix`, decompressed, in path order.
    ///
    /// The blob stored at exactly `prefix` is included. A trailing separator on
    /// `prefix` is ignored and an empty prefix covers the whole store. Corrupt
    /// entries follow the configured `CorruptBlobPolicy`.
    pub fn get_range(&self, prefix: &str) -> Result<Vec<BlobEntry>, StoreError> {
        let prefix = prefix.trim_end_matches(PATH_SEPARATOR);
        let read_txn = self.db.begin_read()?;
        let blobs_table = read_txn.open_table(BLOBS)?;

        let mut entries = Vec::new();
        if !prefix.is_empty() {
            let exact = BlobKey::parse(prefix)?;
            if let Some(stored) = blobs_table.get((exact.parent.as_str(), exact.leaf.as_str()))? {
                self.push_decoded(&mut entries, prefix.to_string(), stored.value())?;
            }
        }

        for entry in blobs_table.range((prefix, "")..)? {
            let (key, stored) = entry?;
            let (parent, leaf) = key.value();
            if !parent.starts_with(prefix) {
                break;
            }
            if !is_beneath(prefix, parent) {
                continue;
            }
            self.push_decoded(&mut entries, join(parent, leaf), stored.value())?;
        }

        entries.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(entries)
    }

    /// Decompress one stored blob into `entries`, skipping empty payloads.
    fn push_decoded(
        &self,
        entries: &mut Vec<BlobEntry>,
        path: String,
        stored: &[u8],
    ) -> Result<(), StoreError> {
        match decompress_blob(stored) {
            Ok(data) if data.is_empty() => Ok(()),
            Ok(data) => {
                entries.push(BlobEntry { path, data });
                Ok(())
            }
            Err(e) => match self.config.corrupt_blob_policy {
                CorruptBlobPolicy::Skip => {
                    tracing::warn!(path = %path, error = %e, "skipping corrupt blob");
                    Ok(())
                }
                CorruptBlobPolicy::Abort => Err(e),
            },
        }
    }

    /// Write raw bytes into the blob table, bypassing compression.
    #[cfg(test)]
    pub(crate) fn put_raw_blob(&self, path: &str, stored: &[u8]) -> Result<(), StoreError> {
        let key = BlobKey::parse(path)?;
        let write_txn = self.db.begin_write()?;
        {
            let mut blobs_table = write_txn.open_table(BLOBS)?;
            blobs_table.insert((key.parent.as_str(), key.leaf.as_str()), stored)?;
        }
        write_txn.commit()?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use tempfile::tempdir;

    fn paths(entries: &[BlobEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.path.as_str()).collect()
    }

    #[test]
    fn blob_key_split() {
        let key = BlobKey::parse("logs/ci/7/artifacts/junit.xml").expect("parse");
        assert_eq!(key.parent, "logs/ci/7/artifacts");
        assert_eq!(key.leaf, "junit.xml");

        let flat = BlobKey::parse("junit.xml").expect("parse");
        assert_eq!(flat.parent, "");
        assert_eq!(flat.leaf, "junit.xml");

        assert!(BlobKey::parse("").is_err());
        assert!(BlobKey::parse("logs/ci/").is_err());
    }

    #[test]
    fn beneath_respects_separator() {
        assert!(is_beneath("b1", "b1"));
        assert!(is_beneath("b1", "b1/artifacts"));
        assert!(!is_beneath("b1", "b10"));
        assert!(!is_beneath("b1", "b1-retry"));
        assert!(is_beneath("", "anything"));
    }

    #[test]
    fn put_overwrites() {
        let temp = tempdir().expect("temp dir");
        let store = Store::open(temp.path().join("kettle.redb")).expect("open");
        let mut writer = store.writer();

        writer.put_blob("b1/x", b"first").expect("put");
        writer.put_blob("b1/x", b"second").expect("put");

        assert_eq!(store.blob("b1/x").expect("get"), Some(b"second".to_vec()));
        assert_eq!(store.stats().expect("stats").blobs, 1);
    }

    #[test]
    fn range_is_hierarchical_and_ordered() {
        let temp = tempdir().expect("temp dir");
        let store = Store::open(temp.path().join("kettle.redb")).expect("open");
        let mut writer = store.writer();

        writer.put_blob("b1/y", b"y").expect("put");
        writer.put_blob("b1/a/z", b"az").expect("put");
        writer.put_blob("b1/x", b"x").expect("put");
        writer.put_blob("b1-retry/x", b"retry").expect("put");
        writer.put_blob("b10/x", b"ten").expect("put");
        writer.put_blob("b2/z", b"z").expect("put");

        let entries = store.get_range("b1").expect("range");
        assert_eq!(paths(&entries), vec!["b1/a/z", "b1/x", "b1/y"]);

        let slash = store.get_range("b1/").expect("range");
        assert_eq!(slash, entries);

        assert_eq!(store.get_range("").expect("range").len(), 6);
    }

    #[test]
    fn range_includes_blob_at_prefix() {
        let temp = tempdir().expect("temp dir");
        let store = Store::open(temp.path().join("kettle.redb")).expect("open");
        let mut writer = store.writer();

        writer.put_blob("b1/x", b"x").expect("put");
        writer.put_blob("b1/x/nested.xml", b"nested").expect("put");
        writer.put_blob("b1/xy", b"xy").expect("put");

        let entries = store.get_range("b1/x").expect("range");
        assert_eq!(paths(&entries), vec!["b1/x", "b1/x/nested.xml"]);
        assert_eq!(entries[0].data, b"x".to_vec());

        writer.put_blob("top", b"flat").expect("put");
        assert_eq!(paths(&store.get_range("top").expect("range")), vec!["top"]);
    }

    #[test]
    fn range_skips_empty_payloads() {
        let temp = tempdir().expect("temp dir");
        let store = Store::open(temp.path().join("kettle.redb")).expect("open");
        let mut writer = store.writer();

        writer.put_blob("b1/empty.xml", b"").expect("put");
        writer.put_blob("b1/full.xml", b"<testsuite/>").expect("put");

        let entries = store.get_range("b1").expect("range");
        assert_eq!(paths(&entries), vec!["b1/full.xml"]);
    }

    #[test]
    fn corrupt_blob_skipped_by_default() {
        let temp = tempdir().expect("temp dir");
        let store = Store::open(temp.path().join("kettle.redb")).expect("open");
        store.writer().put_blob("b1/good.xml", b"ok").expect("put");
        store.put_raw_blob("b1/bad.xml", b"not zlib at all").expect("raw");

        let entries = store.get_range("b1").expect("range");
        assert_eq!(paths(&entries), vec!["b1/good.xml"]);
    }

    #[test]
    fn corrupt_blob_aborts_when_configured() {
        let temp = tempdir().expect("temp dir");
        let config = StoreConfig::default().with_corrupt_blob_policy(CorruptBlobPolicy::Abort);
        let store =
            Store::open_with_config(temp.path().join("kettle.redb"), config).expect("open");
        store.writer().put_blob("b1/good.xml", b"ok").expect("put");
        store.put_raw_blob("b1/bad.xml", b"not zlib at all").expect("raw");

        let result = store.get_range("b1");
        assert!(matches!(result, Err(StoreError::Decode(_))));
    }

    #[test]
    fn uncompressed_level_still_roundtrips() {
        let temp = tempdir().expect("temp dir");
        let config = StoreConfig::default().with_compression_level(0);
        let store =
            Store::open_with_config(temp.path().join("kettle.redb"), config).expect("open");
        store.writer().put_blob("b1/x", b"payload").expect("put");

        assert_eq!(store.blob("b1/x").expect("get"), Some(b"payload".to_vec()));
    }
}
