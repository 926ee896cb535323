//! # redb-backed Build Store
//!
//! A disk-backed store for build metadata, artifact blobs, enumeration
//! markers and emission cursors, using the redb embedded database:
//! - ACID transactions (every public operation is one transaction)
//! - Crash safety (copy-on-write B-trees, immediate durability on commit)
//! - MVCC (concurrent readers, single writer)
//!
//! ## Writers and readers
//!
//! Read operations and cursor operations take `&self`, so a `Store` can be
//! shared across threads behind an `Arc`. Ingestion mutations are only
//! reachable through an `IngestWriter`, which holds the store's exclusive
//! write lock for as long as it lives.

use crate::config::StoreConfig;
use crate::primitives::is_valid_cursor_name;
use crate::storage::tables::{
    BLOBS, BUILD_PATHS, BUILDS, CURSORS, FINISHED_INDEX, JUNIT_GRABBED, METADATA,
};
use crate::StoreError;
use redb::{Database, ReadableDatabase, ReadableTableMetadata};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Row, blob, marker and cursor counts of a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StoreStats {
    pub builds: u64,
    pub blobs: u64,
    pub enumerated: u64,
    pub cursors: u64,
}

/// The build store.
pub struct Store {
    /// The redb database handle.
    pub(crate) db: Database,
    pub(crate) config: StoreConfig,
    /// Serializes ingestion. Guards no data: the database holds the state.
    write_lock: Mutex<()>,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Store {
    /// Open or create a store at the given path with default configuration.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::open_with_config(path, StoreConfig::default())
    }

    /// Open or create a store at the given path.
    pub fn open_with_config(path: impl AsRef<Path>, config: StoreConfig) -> Result<Self, StoreError> {
        config.validate()?;
        let path = path.as_ref();
        let db = Database::create(path)?;

        // Create the fixed tables so readers never see them missing.
        {
            let write_txn = db.begin_write()?;
            let _ = write_txn.open_table(BUILDS)?;
            let _ = write_txn.open_table(BUILD_PATHS)?;
            let _ = write_txn.open_table(FINISHED_INDEX)?;
            let _ = write_txn.open_table(BLOBS)?;
            let _ = write_txn.open_table(JUNIT_GRABBED)?;
            let _ = write_txn.open_table(CURSORS)?;
            let _ = write_txn.open_table(METADATA)?;
            write_txn.commit()?;
        }

        tracing::info!(path = %path.display(), "opened build store");

        Ok(Self {
            db,
            config,
            write_lock: Mutex::new(()),
        })
    }

    /// The configuration this store was opened with.
    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Name of the cursor used when a consumer does not name its own.
    #[must_use]
    pub fn default_cursor(&self) -> &str {
        &self.config.default_cursor
    }

    /// Acquire the exclusive ingest writer, waiting for any current one.
    pub fn writer(&self) -> IngestWriter<'_> {
        let guard = self
            .write_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        IngestWriter {
            store: self,
            _guard: guard,
        }
    }

    /// Acquire the exclusive ingest writer without waiting.
    pub fn try_writer(&self) -> Result<IngestWriter<'_>, StoreError> {
        let guard = match self.write_lock.try_lock() {
            Ok(guard) => guard,
            Err(std::sync::TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(std::sync::TryLockError::WouldBlock) => return Err(StoreError::WriterBusy),
        };
        Ok(IngestWriter {
            store: self,
            _guard: guard,
        })
    }

    /// Compact the database file.
    pub fn compact(&mut self) -> Result<(), StoreError> {
        self.db.compact()?;
        Ok(())
    }

    /// Count rows in the fixed tables.
    pub fn stats(&self) -> Result<StoreStats, StoreError> {
        let read_txn = self.db.begin_read()?;
        Ok(StoreStats {
            builds: read_txn.open_table(BUILDS)?.len()?,
            blobs: read_txn.open_table(BLOBS)?.len()?,
            enumerated: read_txn.open_table(JUNIT_GRABBED)?.len()?,
            cursors: read_txn.open_table(CURSORS)?.len()?,
        })
    }

    /// Number of build rows.
    pub fn build_count(&self) -> Result<u64, StoreError> {
        let read_txn = self.db.begin_read()?;
        Ok(read_txn.open_table(BUILDS)?.len()?)
    }

    pub(crate) fn check_cursor_name(name: &str) -> Result<(), StoreError> {
        if is_valid_cursor_name(name) {
            Ok(())
        } else {
            Err(StoreError::InvalidCursorName(name.to_string()))
        }
    }
}

/// Exclusive handle for ingestion writes.
///
/// Only one exists per `Store` at a time. Build table, blob and marker
/// mutations are methods on this type.
pub struct IngestWriter<'a> {
    pub(crate) store: &'a Store,
    _guard: MutexGuard<'a, ()>,
}

impl std::fmt::Debug for IngestWriter<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngestWriter").finish_non_exhaustive()
    }
}

impl IngestWriter<'_> {
    /// The store this writer mutates.
    #[must_use]
    pub fn store(&self) -> &Store {
        self.store
    }
}
