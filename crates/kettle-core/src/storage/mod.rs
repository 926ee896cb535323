//! # Storage Module
//!
//! The redb-backed `Store`, its table layout, and the single-writer handle.
//!
//! Component operations (`blob`, `builds`, `artifacts`, `oracle`, `cursor`)
//! are implemented as methods on `Store` and `IngestWriter` in their own
//! modules; this module owns the database handle and the write lock.

mod store;
pub(crate) mod tables;

pub use store::*;
