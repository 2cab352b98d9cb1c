//! SQLite persistence layer for tablesync.
//!
//! Provides the capabilities the synchronizer needs from a host database:
//!
//! - table introspection ([`TableSchema`], [`Column`], [`Affinity`])
//! - in-memory rows with change tracking ([`Row`])
//! - keyed lookups, inserts and updates ([`RowStore`])
//! - scoped transactions that commit on success and roll back on error
//!   ([`Database::transaction`])
//!
//! # Typing
//!
//! Values travel as `serde_json::Value`. Assigning a value to a row casts it
//! to the column's affinity, the way an ORM type-casts attribute writes: a
//! CSV cell `"42"` written to an INTEGER column becomes the number `42`, so
//! comparing it against the stored value detects "no change".

mod database;
mod error;
mod row;
mod schema;
mod store;
mod value;

pub use database::Database;
pub use error::{DbError, DbResult};
pub use row::Row;
pub use schema::{Affinity, Column, TableSchema};
pub use store::RowStore;
pub use value::{from_sql, to_sql};
