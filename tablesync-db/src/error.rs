//! Error types for the persistence layer.

use thiserror::Error;

/// Result type for persistence operations.
pub type DbResult<T> = Result<T, DbError>;

/// Errors that can occur in persistence operations.
#[derive(Debug, Error)]
pub enum DbError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A write violated a NOT NULL, UNIQUE, CHECK or FOREIGN KEY constraint.
    #[error("constraint failed on {table}: {message}")]
    Constraint { table: String, message: String },

    /// The table does not exist.
    #[error("table not found: {0}")]
    TableNotFound(String),

    /// The table has no such column.
    #[error("table {table} has no column {column}")]
    UnknownColumn { table: String, column: String },

    /// Invalid data.
    #[error("invalid data: {0}")]
    InvalidData(String),
}

impl DbError {
    /// Classifies a SQLite error raised while writing to `table`.
    pub(crate) fn from_write(table: &str, err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, message)
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Self::Constraint {
                    table: table.to_string(),
                    message: message.clone().unwrap_or_else(|| e.to_string()),
                }
            }
            _ => Self::Database(err),
        }
    }

    pub fn is_constraint(&self) -> bool {
        matches!(self, Self::Constraint { .. })
    }
}
