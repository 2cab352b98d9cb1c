//! Error types for the sync layer.

use tablesync_db::DbError;
use tablesync_model::ModelError;
use tablesync_source::SourceError;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur while synchronizing support tables.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A data source could not be read or decoded.
    #[error("parse error: {0}")]
    Parse(#[source] SourceError),

    /// Canonical data or registration is unusable (missing key values,
    /// unknown entity types, tables without the key column).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A row failed validation or a database constraint. The whole entity
    /// type's transaction has been rolled back.
    #[error("validation failed for {entity} record {key:?}: {}", errors.join("; "))]
    Validation {
        entity: String,
        key: String,
        errors: Vec<String>,
    },

    /// Dependency ordering could not be computed.
    #[error("dependency resolution error: {0}")]
    Dependency(String),

    /// Database error.
    #[error("database error: {0}")]
    Database(#[from] DbError),
}

impl From<SourceError> for SyncError {
    fn from(err: SourceError) -> Self {
        if err.is_parse_error() {
            Self::Parse(err)
        } else {
            Self::Configuration(err.to_string())
        }
    }
}

impl From<ModelError> for SyncError {
    fn from(err: ModelError) -> Self {
        Self::Configuration(err.to_string())
    }
}
