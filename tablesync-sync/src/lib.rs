//! Support table synchronization for tablesync.
//!
//! Support tables hold reference data (colors, statuses, countries) whose
//! canonical content lives in data files checked in next to the code. This
//! crate upserts that content into the database.
//!
//! # Architecture
//!
//! - **Registry**: entity types, their tables, data sources and references
//! - **Synchronizer**: transactional upsert of one entity type
//! - **Resolver**: dependency order across entity types
//! - **Orchestrator**: runs the synchronizer over every type in order
//!
//! ## Sync Process
//!
//! 1. **Load**: read and merge the type's data files by key value
//! 2. **Match**: fetch existing rows whose key is in the canonical data
//! 3. **Update**: apply canonical attributes to matched rows, write the changed ones
//! 4. **Create**: insert a row for every unmatched canonical record
//! 5. **Commit**: all of the above in one transaction; any failure rolls it back
//!
//! Rows absent from the canonical data are never modified or deleted.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use tablesync_db::Database;
//! use tablesync_model::{EntityDefinition, SyncConfig};
//! use tablesync_sync::{EntityRegistry, Orchestrator, Synchronizer};
//!
//! let mut registry = EntityRegistry::new(SyncConfig::default());
//! registry
//!     .register(EntityDefinition::new("Color", "colors"))
//!     .unwrap();
//!
//! let db = Database::open_in_memory().unwrap();
//! let orchestrator = Orchestrator::new(Synchronizer::new(db, Arc::new(registry)));
//! let report = orchestrator.sync_all(&["Color"]).unwrap();
//! assert!(report["Color"].is_empty());
//! ```

mod error;
mod handler;
mod orchestrator;
mod registry;
mod resolver;
mod synchronizer;

pub use error::{SyncError, SyncResult};
pub use handler::{EntityHandler, ReferenceLookup};
pub use orchestrator::{Orchestrator, SyncReport};
pub use registry::{EntityRegistry, RegisteredEntity};
pub use resolver::DependencyResolver;
pub use synchronizer::Synchronizer;

pub use tablesync_model::{ChangeKind, ChangeRecord};
