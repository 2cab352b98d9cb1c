//! Error types for the model layer.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Configuration problems detected while building or loading definitions.
#[derive(Debug, Error)]
pub enum ModelError {
    /// The data source's extension does not name a supported format.
    #[error("unsupported data source format: {}", .0.display())]
    UnknownFormat(PathBuf),

    /// A named instance is not a usable identifier.
    #[error("invalid instance name {0:?}")]
    InvalidName(String),

    /// The same instance name points at two different keys.
    #[error("instance name {name:?} is defined for both key {first:?} and key {second:?}")]
    DuplicateName {
        name: String,
        first: String,
        second: String,
    },

    /// The registration manifest could not be parsed.
    #[error("invalid manifest: {0}")]
    Manifest(#[from] toml::de::Error),

    /// IO error reading a manifest.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
