//! # Core Type Definitions
//!
//! This module contains the shared types of the kettle store:
//! - Identifiers (`RowId`, `Generation`, `BuildKey`)
//! - Build manifests (`Manifest`) and their stored form (`BuildRecord`)
//! - Decoded rows handed to callers (`Build`, `BlobEntry`)
//! - Write outcomes (`UpsertOutcome`)
//! - Error types (`StoreError`)
//!
//! ## Ordering Guarantees
//!
//! Identifiers implement `Ord` so results can be returned in `BTreeSet`/`BTreeMap`
//! with a deterministic order for a fixed store state.

use crate::primitives::PATH_SEPARATOR;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Internal identifier of a build row.
///
/// Assigned at insertion from a persisted counter and never reused, so a row id
/// recorded by an emission cursor or an enumeration marker always refers to
/// exactly one version of a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RowId(pub u64);

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Tag grouping the rows delivered by one `commit_emitted` call.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct Generation(pub u64);

impl Generation {
    /// The generation following this one.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }

    /// Get the raw generation number.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

/// `(job, build number)` pair reported by the existence oracle.
///
/// Derived from the last two segments of a build path below a jobs directory.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BuildKey {
    pub job: String,
    pub number: String,
}

impl BuildKey {
    /// Create a new key.
    #[must_use]
    pub fn new(job: impl Into<String>, number: impl Into<String>) -> Self {
        Self {
            job: job.into(),
            number: number.into(),
        }
    }

    /// Derive the key for `path` relative to `jobs_dir`.
    ///
    /// The suffix after `jobs_dir` is split on `PATH_SEPARATOR` and the last two
    /// segments are kept. A suffix with a single segment yields an empty job.
    #[must_use]
    pub fn from_path(jobs_dir: &str, path: &str) -> Self {
        let suffix = path.strip_prefix(jobs_dir).unwrap_or(path);
        let mut segments = suffix.rsplit(PATH_SEPARATOR);
        let number = segments.next().unwrap_or_default();
        let job = segments.next().unwrap_or_default();
        Self::new(job, number)
    }
}

// =============================================================================
// MANIFESTS
// =============================================================================

/// A `started` or `finished` manifest: a JSON object describing a build's
/// lifecycle state.
///
/// The store treats manifests as opaque apart from the `timestamp` field.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Manifest(Map<String, Value>);

impl Manifest {
    /// Create an empty manifest.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a manifest from a JSON value, which must be an object.
    pub fn from_value(value: Value) -> Result<Self, StoreError> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(StoreError::Decode(format!(
                "manifest must be a JSON object, got {other}"
            ))),
        }
    }

    /// Set a field, returning the manifest for chaining.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Get a field.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// The `timestamp` field as integer seconds since the epoch.
    ///
    /// Integer, integer-string and float encodings are accepted; floats are
    /// truncated toward zero.
    #[must_use]
    pub fn timestamp(&self) -> Option<i64> {
        match self.0.get("timestamp")? {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_u64().and_then(|v| i64::try_from(v).ok()))
                .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64)),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Canonical JSON text (keys sorted), the stored form of a manifest.
    pub fn to_json(&self) -> Result<String, StoreError> {
        serde_json::to_string(&self.0).map_err(|e| StoreError::Encode(e.to_string()))
    }

    /// Decode a manifest from its stored JSON text.
    pub fn from_json(text: &str) -> Result<Self, StoreError> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| StoreError::Decode(e.to_string()))?;
        Self::from_value(value)
    }
}

impl TryFrom<Value> for Manifest {
    type Error = StoreError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::from_value(value)
    }
}

// =============================================================================
// BUILD ROWS
// =============================================================================

/// Stored form of a build row.
///
/// Manifests stay as JSON text until a caller asks for them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildRecord {
    pub path: String,
    pub started_json: Option<String>,
    pub finished_json: Option<String>,
    /// `finished.timestamp`, kept as a sortable column.
    pub finished_time: Option<i64>,
}

impl BuildRecord {
    /// Decode the `started` manifest.
    pub fn started(&self) -> Result<Option<Manifest>, StoreError> {
        self.started_json
            .as_deref()
            .map(Manifest::from_json)
            .transpose()
    }

    /// Decode the `finished` manifest.
    pub fn finished(&self) -> Result<Option<Manifest>, StoreError> {
        self.finished_json
            .as_deref()
            .map(Manifest::from_json)
            .transpose()
    }

    /// Decode into a caller-facing `Build`.
    pub fn decode(self, row_id: RowId) -> Result<Build, StoreError> {
        let started = self.started()?;
        let finished = self.finished()?;
        Ok(Build {
            row_id,
            path: self.path,
            started,
            finished,
            finished_time: self.finished_time,
        })
    }
}

/// A decoded build row, as yielded by emission cursors and lookups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Build {
    pub row_id: RowId,
    pub path: String,
    pub started: Option<Manifest>,
    pub finished: Option<Manifest>,
    pub finished_time: Option<i64>,
}

impl Build {
    /// A build is complete once it has a `finished` manifest.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.finished.is_some()
    }
}

/// Result of `IngestWriter::upsert_build`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// The path was unknown; a new row was created.
    Inserted(RowId),
    /// The row's content changed and it was re-keyed under a fresh id.
    Updated { previous: RowId, current: RowId },
    /// The merged content equals the stored row; nothing was written.
    Unchanged(RowId),
}

impl UpsertOutcome {
    /// The row id that now holds the build.
    #[must_use]
    pub const fn row_id(self) -> RowId {
        match self {
            Self::Inserted(id) | Self::Unchanged(id) => id,
            Self::Updated { current, .. } => current,
        }
    }
}

/// A decompressed blob and the full path it was stored under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobEntry {
    pub path: String,
    pub data: Vec<u8>,
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the kettle store.
///
/// - No silent failures: skipped corrupt blobs are logged
/// - Use `Result<T, StoreError>` for fallible operations
/// - The store never panics; all errors are returned to the caller
#[derive(Debug, Error)]
pub enum StoreError {
    /// Engine-level I/O or corruption failure.
    #[error("storage error: {0}")]
    Storage(String),

    /// A manifest, row record or blob payload could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),

    /// A value could not be encoded for storage.
    #[error("encode error: {0}")]
    Encode(String),

    /// No build row has this id.
    #[error("build not found: row {0}")]
    BuildNotFound(RowId),

    /// A blob or build path is not usable as a key.
    #[error("invalid path: {0:?}")]
    InvalidPath(String),

    /// A cursor name is empty, too long, or uses characters outside `[A-Za-z0-9_.-]`.
    #[error("invalid cursor name: {0:?}")]
    InvalidCursorName(String),

    /// The configuration could not be loaded or failed validation.
    #[error("config error: {0}")]
    Config(String),

    /// Another `IngestWriter` is alive.
    #[error("an ingest writer is already active")]
    WriterBusy,
}

macro_rules! storage_error_from {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for StoreError {
                fn from(e: $ty) -> Self {
                    Self::Storage(e.to_string())
                }
            }
        )*
    };
}

storage_error_from!(
    redb::Error,
    redb::DatabaseError,
    redb::TransactionError,
    redb::TableError,
    redb::StorageError,
    redb::CommitError,
    redb::CompactionError,
    std::io::Error,
);

// =============================================================================
// TESTS
// =============================================================================
