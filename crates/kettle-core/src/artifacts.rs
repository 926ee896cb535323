//! # Artifact Index
//!
//! Result files (JUnit XML and friends) stored per build, plus the
//! "already enumerated" markers that keep enumeration to once per build row.
//!
//! Blob writes and the marker for a build commit in one transaction: after a
//! crash either both are visible or neither is, and a retry simply rewrites
//! the same blobs.

use crate::blob::BlobKey;
use crate::formats::{compress_blob, record_from_bytes};
use crate::storage::tables::{BLOBS, BUILDS, JUNIT_GRABBED};
use crate::storage::{IngestWriter, Store};
use crate::{RowId, StoreError};
use redb::{ReadableDatabase, ReadableTable};

impl Store {
    /// `(row id, path)` of every build whose artifacts were not enumerated yet,
    /// in row id order.
    pub fn builds_missing_artifact_enumeration(&self) -> Result<Vec<(RowId, String)>, StoreError> {
        let read_txn = self.db.begin_read()?;
        let builds_table = read_txn.open_table(BUILDS)?;
        let grabbed_table = read_txn.open_table(JUNIT_GRABBED)?;

        let mut missing = Vec::new();
        for entry in builds_table.iter()? {
            let (key, value) = entry?;
            let id = key.value();
            if grabbed_table.get(id)?.is_some() {
                continue;
            }
            let record = record_from_bytes(value.value())?;
            missing.push((RowId(id), record.path));
        }
        Ok(missing)
    }

    /// Whether artifact enumeration was recorded for `id`.
    pub fn is_enumerated(&self, id: RowId) -> Result<bool, StoreError> {
        let read_txn = self.db.begin_read()?;
        let grabbed_table = read_txn.open_table(JUNIT_GRABBED)?;
        Ok(grabbed_table.get(id.0)?.is_some())
    }

    /// Decompressed contents of every artifact stored under `build_path`.
    ///
    /// Empty when nothing is stored there.
    pub fn artifacts_for_build(&self, build_path: &str) -> Result<Vec<Vec<u8>>, StoreError> {
        Ok(self
            .get_range(build_path)?
            .into_iter()
            .map(|entry| entry.data)
            .collect())
    }
}

impl IngestWriter<'_> {
    /// Store the artifacts found for build `id` and mark it enumerated.
    ///
    /// `artifacts` maps artifact path to raw, uncompressed bytes. Fails with
    /// `StoreError::BuildNotFound` if `id` is not a live row; nothing is
    /// written in that case.
    pub fn mark_artifacts_enumerated<I, P, B>(
        &mut self,
        id: RowId,
        artifacts: I,
    ) -> Result<usize, StoreError>
    where
        I: IntoIterator<Item = (P, B)>,
        P: AsRef<str>,
        B: AsRef<[u8]>,
    {
        let level = self.store.config.compression_level;
        let mut encoded = Vec::new();
        for (path, raw) in artifacts {
            let key = BlobKey::parse(path.as_ref())?;
            encoded.push((key, compress_blob(raw.as_ref(), level)?));
        }

        let write_txn = self.store.db.begin_write()?;
        {
            let builds_table = write_txn.open_table(BUILDS)?;
            if builds_table.get(id.0)?.is_none() {
                return Err(StoreError::BuildNotFound(id));
            }

            let mut blobs_table = write_txn.open_table(BLOBS)?;
            for (key, stored) in &encoded {
                blobs_table.insert((key.parent.as_str(), key.leaf.as_str()), stored.as_slice())?;
            }

            let mut grabbed_table = write_txn.open_table(JUNIT_GRABBED)?;
            grabbed_table.insert(id.0, ())?;
        }
        write_txn.commit()?;

        tracing::debug!(row_id = %id, artifacts = encoded.len(), "marked build enumerated");
        Ok(encoded.len())
    }
}
