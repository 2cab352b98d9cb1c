//! Core model for tablesync.
//!
//! Defines the types every tablesync crate depends on:
//! - [`EntityDefinition`]: a support table registration (table, key attribute,
//!   data sources, declared dependencies, reference-style fields)
//! - [`CanonicalRecord`]: one record as defined by the version-controlled data files
//! - [`ChangeRecord`]: the per-row `attribute -> (old, new)` report of a sync
//! - [`SyncConfig`] / [`Manifest`]: process-wide defaults and TOML registration
//! - [`NamedInstances`]: symbolic instance names mapped to canonical keys
//!
//! Nothing in this crate touches the database or the file system except
//! [`Manifest::load`].

mod change;
mod config;
mod entity;
mod error;
mod named;
mod record;

pub use change::{ChangeKind, ChangeRecord};
pub use config::{DEFAULT_DATA_DIR, Manifest, ManifestSettings, SyncConfig};
pub use entity::{DEFAULT_PRIMARY_KEY, DataSource, EntityDefinition, Reference, SourceFormat};
pub use error::{ModelError, ModelResult};
pub use named::{NamedInstance, NamedInstances, is_valid_instance_name};
pub use record::{Attributes, CanonicalRecord, key_string};
