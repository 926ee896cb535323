//! # Store Primitives
//!
//! Compiled-in constants for the kettle store.
//!
//! Values here are defaults or hard limits; anything an operator may tune is
//! surfaced again through `StoreConfig`.

/// Age after which an unfinished build is presumed abandoned.
///
/// - A build with a `started` manifest older than this and no `finished`
///   manifest is reported as settled by the existence oracle.
/// - 5 days, in seconds.
pub const STALE_BUILD_AGE_SECS: u64 = 60 * 60 * 24 * 5;

/// zlib level used for artifact blobs unless configured otherwise.
pub const DEFAULT_COMPRESSION_LEVEL: u32 = 9;

/// Highest zlib compression level.
pub const MAX_COMPRESSION_LEVEL: u32 = 9;

/// Cursor used by consumers that do not name their own.
pub const DEFAULT_CURSOR: &str = "build_emitted";

/// Prefix of the per-cursor delivered-set tables.
///
/// The table for cursor `name` is `emitted:{name}`.
pub const CURSOR_TABLE_PREFIX: &str = "emitted:";

/// Maximum length of a cursor name in bytes.
pub const MAX_CURSOR_NAME_LENGTH: usize = 64;

/// Path separator of build and artifact paths.
pub const PATH_SEPARATOR: char = '/';

/// Metadata key holding the next unallocated row id.
pub const NEXT_ROW_ID_KEY: &str = "next_row_id";

/// Check that a cursor name is usable as part of a table name.
///
/// Names are non-empty, at most `MAX_CURSOR_NAME_LENGTH` bytes, and use only
/// ASCII alphanumerics, `_`, `-` and `.`.
#[must_use]
pub fn is_valid_cursor_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= MAX_CURSOR_NAME_LENGTH
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'-' | b'.'))
}
