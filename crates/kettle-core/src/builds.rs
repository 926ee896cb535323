//! # Build Table
//!
//! Canonical record of every known build, keyed by its unique path.
//!
//! ## Upsert rules
//!
//! - Absent incoming manifests keep the stored ones: a complete build is never
//!   downgraded to in-flight.
//! - If the merged row equals the stored row nothing is written.
//! - If the content changed the row is re-keyed under a fresh `RowId`. The old
//!   row and its emission-order entry go away; the new id has no enumeration
//!   marker and no cursor has delivered it, so the new version is enumerated
//!   and emitted again. Markers of retired ids stay, since ids are never reused.

use crate::storage::tables::{
    BUILD_PATHS, BUILDS, FINISHED_INDEX, METADATA, allocate_row_id, read_record,
};
use crate::storage::{IngestWriter, Store};
use crate::{Build, BuildRecord, Manifest, RowId, StoreError, UpsertOutcome, formats};
use redb::{ReadableDatabase, ReadableTable};

impl IngestWriter<'_> {
    /// Insert or update the build at `path`.
    ///
    /// Re-inserting an identical `(path, started, finished)` triple is a no-op.
    /// A `started` manifest must carry a `timestamp`; otherwise nothing is
    /// written and `StoreError::Decode` is returned.
    pub fn upsert_build(
        &mut self,
        path: &str,
        started: Option<&Manifest>,
        finished: Option<&Manifest>,
    ) -> Result<UpsertOutcome, StoreError> {
        if path.is_empty() {
            return Err(StoreError::InvalidPath(path.to_string()));
        }
        let started_json = match started {
            Some(manifest) if manifest.timestamp().is_none() => {
                return Err(StoreError::Decode(format!(
                    "started manifest of {} has no timestamp",
                    path
                )));
            }
            Some(manifest) => Some(manifest.to_json()?),
            None => None,
        };
        let finished_json = finished.map(Manifest::to_json).transpose()?;

        let write_txn = self.store.db.begin_write()?;
        let outcome = {
            let mut builds_table = write_txn.open_table(BUILDS)?;
            let mut paths_table = write_txn.open_table(BUILD_PATHS)?;
            let mut finished_table = write_txn.open_table(FINISHED_INDEX)?;
            let mut meta_table = write_txn.open_table(METADATA)?;

            let existing_id = paths_table.get(path)?.map(|v| RowId(v.value()));
            let existing = match existing_id {
                Some(id) => read_record(&builds_table, id)?.map(|record| (id, record)),
                None => None,
            };

            let (finished_json, finished_time) = match (finished_json, &existing) {
                (Some(json), _) => (Some(json), finished.and_then(Manifest::timestamp)),
                (None, Some((_, previous))) => {
                    (previous.finished_json.clone(), previous.finished_time)
                }
                (None, None) => (None, None),
            };
            let started_json = started_json
                .or_else(|| existing.as_ref().and_then(|(_, p)| p.started_json.clone()));

            let record = BuildRecord {
                path: path.to_string(),
                started_json,
                finished_json,
                finished_time,
            };

            match existing {
                Some((id, previous)) if previous == record => UpsertOutcome::Unchanged(id),
                Some((previous_id, previous)) => {
                    builds_table.remove(previous_id.0)?;
                    if let Some(time) = previous.finished_time {
                        finished_table.remove((time, previous_id.0))?;
                    }

                    let id = allocate_row_id(&mut meta_table)?;
                    let bytes = formats::record_to_bytes(&record)?;
                    builds_table.insert(id.0, bytes.as_slice())?;
                    paths_table.insert(path, id.0)?;
                    if let Some(time) = record.finished_time {
                        finished_table.insert((time, id.0), path)?;
                    }
                    UpsertOutcome::Updated {
                        previous: previous_id,
                        current: id,
                    }
                }
                None => {
                    let id = allocate_row_id(&mut meta_table)?;
                    let bytes = formats::record_to_bytes(&record)?;
                    builds_table.insert(id.0, bytes.as_slice())?;
                    paths_table.insert(path, id.0)?;
                    if let Some(time) = record.finished_time {
                        finished_table.insert((time, id.0), path)?;
                    }
                    UpsertOutcome::Inserted(id)
                }
            }
        };

        match outcome {
            UpsertOutcome::Unchanged(_) => write_txn.abort()?,
            UpsertOutcome::Inserted(id) => {
                write_txn.commit()?;
                tracing::debug!(path, row_id = %id, "inserted build");
            }
            UpsertOutcome::Updated { previous, current } => {
                write_txn.commit()?;
                tracing::debug!(path, %previous, %current, "re-keyed changed build");
            }
        }
        Ok(outcome)
    }
}

impl Store {
    /// Look up a build by path.
    pub fn build(&self, path: &str) -> Result<Option<Build>, StoreError> {
        let read_txn = self.db.begin_read()?;
        let paths_table = read_txn.open_table(BUILD_PATHS)?;
        let Some(id) = paths_table.get(path)?.map(|v| RowId(v.value())) else {
            return Ok(None);
        };
        let builds_table = read_txn.open_table(BUILDS)?;
        read_record(&builds_table, id)?
            .map(|record| record.decode(id))
            .transpose()
    }

    /// Look up a build by row id.
    pub fn build_by_id(&self, id: RowId) -> Result<Option<Build>, StoreError> {
        let read_txn = self.db.begin_read()?;
        let builds_table = read_txn.open_table(BUILDS)?;
        read_record(&builds_table, id)?
            .map(|record| record.decode(id))
            .transpose()
    }
}
