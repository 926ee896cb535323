//! # Existence Oracle
//!
//! Tells an upstream crawler which `(job, build number)` pairs under a jobs
//! directory are settled and need not be fetched again.
//!
//! A build is settled when it has a `finished` manifest, or when it has only a
//! `started` manifest older than the staleness threshold (presumed abandoned).
//! Everything is read from one snapshot.

use crate::storage::Store;
use crate::storage::tables::{BUILD_PATHS, BUILDS, read_record};
use crate::{BuildKey, RowId, StoreError};
use redb::{ReadableDatabase, ReadableTable};
use std::collections::BTreeSet;
use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall-clock time in unix seconds.
fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

impl Store {
    /// Settled builds under `jobs_dir`, judged against the current time.
    pub fn existing_builds(&self, jobs_dir: &str) -> Result<BTreeSet<BuildKey>, StoreError> {
        self.existing_builds_at(jobs_dir, unix_now())
    }

    /// Settled builds under `jobs_dir`, judged against `now` (unix seconds).
    pub fn existing_builds_at(
        &self,
        jobs_dir: &str,
        now: i64,
    ) -> Result<BTreeSet<BuildKey>, StoreError> {
        let threshold = i64::try_from(self.config.stale_after_secs).unwrap_or(i64::MAX);
        let cutoff = now.saturating_sub(threshold);

        let read_txn = self.db.begin_read()?;
        let paths_table = read_txn.open_table(BUILD_PATHS)?;
        let builds_table = read_txn.open_table(BUILDS)?;

        let mut settled = BTreeSet::new();
        for entry in paths_table.range(jobs_dir..)? {
            let (key, value) = entry?;
            let path = key.value();
            if !path.starts_with(jobs_dir) {
                break;
            }

            let id = RowId(value.value());
            let Some(record) = read_record(&builds_table, id)? else {
                return Err(StoreError::Storage(format!(
                    "path index entry {} points at missing row {}",
                    path, id
                )));
            };

            if record.finished_json.is_some() {
                settled.insert(BuildKey::from_path(jobs_dir, path));
                continue;
            }
            if let Some(started) = record.started()? {
                let timestamp = started.timestamp().ok_or_else(|| {
                    StoreError::Decode(format!("started manifest of {} has no timestamp", path))
                })?;
                if timestamp < cutoff {
                    settled.insert(BuildKey::from_path(jobs_dir, path));
                }
            }
        }
        Ok(settled)
    }
}
