//! Error types for canonical data loading.

use std::path::PathBuf;
use tablesync_model::{ModelError, SourceFormat};
use thiserror::Error;

/// Result type for loader operations.
pub type SourceResult<T> = Result<T, SourceError>;

/// Errors that can occur while loading canonical records.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The data source could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The data source is not valid in its declared format.
    #[error("failed to parse {} as {format}: {message}", path.display())]
    Parse {
        path: PathBuf,
        format: SourceFormat,
        message: String,
    },

    /// A record has no value for the key attribute.
    #[error("record {index} in {} has no value for key attribute {key_attribute:?}", path.display())]
    MissingKey {
        path: PathBuf,
        key_attribute: String,
        index: usize,
    },

    /// A record's key attribute holds a list or mapping.
    #[error("record {index} in {} has a non-scalar value for key attribute {key_attribute:?}: {value}", path.display())]
    InvalidKey {
        path: PathBuf,
        key_attribute: String,
        index: usize,
        value: String,
    },

    /// Named instances could not be built.
    #[error(transparent)]
    Model(#[from] ModelError),
}

impl SourceError {
    /// Whether the error is a decoding failure rather than a configuration problem.
    pub fn is_parse_error(&self) -> bool {
        matches!(self, Self::Io { .. } | Self::Parse { .. })
    }
}
