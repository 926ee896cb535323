//! redb table definitions and small typed helpers shared by the components.

use crate::formats::record_from_bytes;
use crate::primitives::{CURSOR_TABLE_PREFIX, NEXT_ROW_ID_KEY};
use crate::{BuildRecord, RowId, StoreError};
use redb::{ReadOnlyTable, ReadTransaction, ReadableTable, Table, TableDefinition, TableError};

/// Build rows: RowId(u64) -> versioned postcard `BuildRecord`
pub(crate) const BUILDS: TableDefinition<u64, &[u8]> = TableDefinition::new("builds");

/// Unique path index: build path -> RowId(u64)
pub(crate) const BUILD_PATHS: TableDefinition<&str, u64> = TableDefinition::new("build_paths");

/// Emission order: (finished_time, RowId) -> build path
///
/// Only rows with a finished timestamp are present.
pub(crate) const FINISHED_INDEX: TableDefinition<(i64, u64), &str> =
    TableDefinition::new("finished_index");

/// Artifact blobs: (parent path, leaf name) -> zlib payload
pub(crate) const BLOBS: TableDefinition<(&str, &str), &[u8]> = TableDefinition::new("blobs");

/// Enumeration markers: RowId(u64) -> ()
pub(crate) const JUNIT_GRABBED: TableDefinition<u64, ()> = TableDefinition::new("junit_grabbed");

/// Known cursors: cursor name -> last generation committed
pub(crate) const CURSORS: TableDefinition<&str, u64> = TableDefinition::new("cursors");

/// Store-wide counters: key -> u64
pub(crate) const METADATA: TableDefinition<&str, u64> = TableDefinition::new("metadata");

/// Name of the delivered-set table of cursor `name`: RowId(u64) -> Generation(u64)
pub(crate) fn cursor_table_name(name: &str) -> String {
    format!("{CURSOR_TABLE_PREFIX}{name}")
}

/// Read and decode one build row.
pub(crate) fn read_record<T>(table: &T, id: RowId) -> Result<Option<BuildRecord>, StoreError>
where
    T: ReadableTable<u64, &'static [u8]>,
{
    match table.get(id.0)? {
        Some(data) => Ok(Some(record_from_bytes(data.value())?)),
        None => Ok(None),
    }
}

/// Open a table that may not have been created yet.
///
/// Cursor tables only exist after the first commit for that cursor; a missing
/// table reads as empty.
pub(crate) fn open_optional<K, V>(
    txn: &ReadTransaction,
    definition: TableDefinition<'_, K, V>,
) -> Result<Option<ReadOnlyTable<K, V>>, StoreError>
where
    K: redb::Key + 'static,
    V: redb::Value + 'static,
{
    match txn.open_table(definition) {
        Ok(table) => Ok(Some(table)),
        Err(TableError::TableDoesNotExist(_)) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Allocate the next row id inside an open write transaction.
pub(crate) fn allocate_row_id(
    meta_table: &mut Table<'_, &'static str, u64>,
) -> Result<RowId, StoreError> {
    let next = meta_table
        .get(NEXT_ROW_ID_KEY)?
        .map(|v| v.value())
        .unwrap_or(0);
    meta_table.insert(NEXT_ROW_ID_KEY, next.saturating_add(1))?;
    Ok(RowId(next))
}
