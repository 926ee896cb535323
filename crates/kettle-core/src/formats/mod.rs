//! # Formats Module
//!
//! Byte-level encodings used by the store tables.
//!
//! - `blob`: zlib compression of artifact payloads
//! - `record`: versioned postcard encoding of build rows

mod blob;
mod record;

pub use blob::*;
pub use record::*;
