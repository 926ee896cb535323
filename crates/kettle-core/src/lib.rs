//! # kettle-core
//!
//! Persistence layer for the kettle build/test-result ingestion pipeline.
//!
//! The store records CI build manifests and JUnit artifacts, tells the
//! upstream crawler which builds are already settled, and lets any number of
//! downstream consumers pull only the builds they have not seen yet.
//!
//! ## Components
//!
//! - **Blob Store** (`blob`): compressed payloads under two-level path keys
//! - **Build Table** (`builds`): one row per build path, idempotent upserts
//! - **Artifact Index** (`artifacts`): per-build result files and the
//!   enumerate-once markers
//! - **Existence Oracle** (`oracle`): settled `(job, build number)` pairs
//! - **Emission Cursor** (`cursor`): named, independent delivered sets
//!
//! ## Concurrency
//!
//! One `IngestWriter` at a time mutates builds, blobs and markers. Cursor
//! reads and commits take `&self` and touch only their own cursor state.
//!
//! ```no_run
//! use kettle_core::{Manifest, Store};
//!
//! # fn main() -> Result<(), kettle_core::StoreError> {
//! let store = Store::open("kettle.redb")?;
//!
//! let started = Manifest::new().with("timestamp", 1_700_000_000);
//! let finished = Manifest::new().with("timestamp", 1_700_000_600).with("result", "SUCCESS");
//! store
//!     .writer()
//!     .upsert_build("gs://logs/ci-unit/42", Some(&started), Some(&finished))?;
//!
//! let mut emitted = Vec::new();
//! for build in store.pending_builds("make_json", "gs://logs/", 0)? {
//!     emitted.push(build?.row_id);
//! }
//! store.commit_emitted("make_json", &emitted)?;
//! # Ok(())
//! # }
//! ```

// =============================================================================
// MODULES
// =============================================================================

pub mod artifacts;
pub mod blob;
pub mod builds;
pub mod config;
pub mod cursor;
pub mod formats;
pub mod oracle;
pub mod primitives;
pub mod storage;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    BlobEntry, Build, BuildKey, BuildRecord, Generation, Manifest, RowId, StoreError,
    UpsertOutcome,
};

// =============================================================================
// RE-EXPORTS: Store
// =============================================================================

pub use config::{CorruptBlobPolicy, StoreConfig};
pub use cursor::PendingBuilds;
pub use storage::{IngestWriter, Store, StoreStats};

// =============================================================================
// RE-EXPORTS: Formats (from formats module)
// =============================================================================

pub use formats::{compress_blob, decompress_blob};
