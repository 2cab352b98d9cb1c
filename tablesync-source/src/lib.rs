//! Canonical data loading for tablesync.
//!
//! Reads every data source declared for an entity type, decodes it in its
//! declared format and merges the records by key value:
//!
//! - sources are processed in declaration order
//! - a key seen again has its attributes shallow-merged, later sources winning
//! - output keeps first-seen key order
//!
//! Each call reads the files again and returns owned records, so callers may
//! mutate what they get back.

mod decode;
mod error;
mod loader;

pub use decode::{SourceEntry, decode};
pub use error::{SourceError, SourceResult};
pub use loader::{CanonicalLoader, merge_entries};
