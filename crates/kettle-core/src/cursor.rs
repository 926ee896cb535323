//! # Emission Cursors
//!
//! Named, independent "already delivered" sets over the build table. Each
//! downstream consumer owns a cursor and pulls only the finished builds its
//! cursor has not seen, in ascending `finished_time` order.
//!
//! ## Protocol
//!
//! 1. `pending_builds(name, prefix, min_finished_time)` snapshots the
//!    emission order and the cursor's delivered set, then yields rows lazily.
//! 2. The consumer processes what it can and calls
//!    `commit_emitted(name, ids)`, which tags the ids with one new generation.
//! 3. Ids not committed are simply yielded again next time.
//!
//! Cursors only ever write their own `emitted:{name}` table and their entry in
//! `cursors`, so they never interfere with each other or with ingestion.

use crate::storage::Store;
use crate::storage::tables::{
    BUILDS, CURSORS, FINISHED_INDEX, cursor_table_name, open_optional, read_record,
};
use crate::{Build, Generation, RowId, StoreError};
use redb::{ReadOnlyTable, ReadableDatabase, ReadableTable, TableDefinition};
use std::collections::BTreeMap;

/// Lazy sequence of builds a cursor has not delivered yet.
///
/// The set of rows is fixed when the sequence is created; rows are decoded one
/// at a time as it advances, so a consumer can stop early cheaply.
pub struct PendingBuilds {
    builds: ReadOnlyTable<u64, &'static [u8]>,
    ids: std::vec::IntoIter<RowId>,
}

impl std::fmt::Debug for PendingBuilds {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingBuilds")
            .field("remaining", &self.ids.len())
            .finish_non_exhaustive()
    }
}

impl PendingBuilds {
    fn load(&self, id: RowId) -> Result<Build, StoreError> {
        match read_record(&self.builds, id)? {
            Some(record) => record.decode(id),
            None => Err(StoreError::BuildNotFound(id)),
        }
    }
}

impl Iterator for PendingBuilds {
    type Item = Result<Build, StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.ids.next()?;
        Some(self.load(id))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.ids.size_hint()
    }
}

impl ExactSizeIterator for PendingBuilds {}

impl Store {
    /// Finished builds under `path_prefix` with `finished_time >= min_finished_time`
    /// that cursor `name` has not delivered, ordered by `finished_time`.
    ///
    /// A cursor that was never committed to has delivered nothing.
    pub fn pending_builds(
        &self,
        name: &str,
        path_prefix: &str,
        min_finished_time: i64,
    ) -> Result<PendingBuilds, StoreError> {
        Self::check_cursor_name(name)?;
        let table_name = cursor_table_name(name);

        let read_txn = self.db.begin_read()?;
        let order_table = read_txn.open_table(FINISHED_INDEX)?;
        let delivered_table =
            open_optional(&read_txn, TableDefinition::<u64, u64>::new(&table_name))?;

        let mut ids = Vec::new();
        for entry in order_table.range((min_finished_time, 0u64)..)? {
            let (key, path) = entry?;
            let (_, id) = key.value();
            if !path.value().starts_with(path_prefix) {
                continue;
            }
            if let Some(delivered) = &delivered_table {
                if delivered.get(id)?.is_some() {
                    continue;
                }
            }
            ids.push(RowId(id));
        }

        tracing::debug!(
            cursor = name,
            path_prefix,
            pending = ids.len(),
            "opened pending builds"
        );

        Ok(PendingBuilds {
            builds: read_txn.open_table(BUILDS)?,
            ids: ids.into_iter(),
        })
    }

    /// Record `ids` as delivered by cursor `name` under one new generation.
    ///
    /// The generation is the cursor's last one plus one, or 0 for a fresh
    /// cursor. Ids already delivered keep their earlier generation, but the
    /// generation is still consumed, so every non-empty call returns a distinct
    /// number. An empty `ids` persists nothing and returns the generation the
    /// next call would use.
    pub fn commit_emitted(&self, name: &str, ids: &[RowId]) -> Result<Generation, StoreError> {
        Self::check_cursor_name(name)?;
        let table_name = cursor_table_name(name);

        let write_txn = self.db.begin_write()?;
        let (generation, recorded) = {
            let mut cursors_table = write_txn.open_table(CURSORS)?;
            let generation = cursors_table
                .get(name)?
                .map(|g| Generation(g.value()).next())
                .unwrap_or_default();

            let mut delivered_table =
                write_txn.open_table(TableDefinition::<u64, u64>::new(&table_name))?;
            let mut recorded = 0usize;
            for id in ids {
                if delivered_table.get(id.0)?.is_none() {
                    delivered_table.insert(id.0, generation.value())?;
                    recorded += 1;
                }
            }
            if !ids.is_empty() {
                cursors_table.insert(name, generation.value())?;
            }
            (generation, recorded)
        };

        if ids.is_empty() {
            write_txn.abort()?;
        } else {
            write_txn.commit()?;
            tracing::debug!(
                cursor = name,
                generation = generation.value(),
                recorded,
                "committed emitted builds"
            );
        }
        Ok(generation)
    }

    /// Discard everything cursor `name` has delivered.
    ///
    /// Returns whether the cursor had any state.
    pub fn reset_cursor(&self, name: &str) -> Result<bool, StoreError> {
        Self::check_cursor_name(name)?;
        let table_name = cursor_table_name(name);

        let write_txn = self.db.begin_write()?;
        let known = {
            let mut cursors_table = write_txn.open_table(CURSORS)?;
            cursors_table.remove(name)?.is_some()
        };
        let dropped = write_txn.delete_table(TableDefinition::<u64, u64>::new(&table_name))?;
        write_txn.commit()?;

        tracing::info!(cursor = name, "reset cursor");
        Ok(known || dropped)
    }

    /// Known cursors and the last generation each committed.
    pub fn cursors(&self) -> Result<BTreeMap<String, Generation>, StoreError> {
        let read_txn = self.db.begin_read()?;
        let cursors_table = read_txn.open_table(CURSORS)?;

        let mut cursors = BTreeMap::new();
        for entry in cursors_table.iter()? {
            let (key, value) = entry?;
            cursors.insert(key.value().to_string(), Generation(value.value()));
        }
        Ok(cursors)
    }

    /// `pending_builds` on the configured default cursor.
    pub fn pending_builds_default(
        &self,
        path_prefix: &str,
        min_finished_time: i64,
    ) -> Result<PendingBuilds, StoreError> {
        self.pending_builds(self.default_cursor(), path_prefix, min_finished_time)
    }

    /// `commit_emitted` on the configured default cursor.
    pub fn commit_emitted_default(&self, ids: &[RowId]) -> Result<Generation, StoreError> {
        self.commit_emitted(self.default_cursor(), ids)
    }

    /// Every row cursor `name` has delivered, with the generation it was
    /// delivered in.
    pub fn delivered(&self, name: &str) -> Result<BTreeMap<RowId, Generation>, StoreError> {
        Self::check_cursor_name(name)?;
        let table_name = cursor_table_name(name);

        let read_txn = self.db.begin_read()?;
        let Some(delivered_table) =
            open_optional(&read_txn, TableDefinition::<u64, u64>::new(&table_name))?
        else {
            return Ok(BTreeMap::new());
        };

        let mut delivered = BTreeMap::new();
        for entry in delivered_table.iter()? {
            let (key, value) = entry?;
            delivered.insert(RowId(key.value()), Generation(value.value()));
        }
        Ok(delivered)
    }
}
