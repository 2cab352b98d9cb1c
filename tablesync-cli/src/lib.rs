//! Shared types for the tablesync command-line task.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use tablesync_model::{ChangeRecord, Manifest};
use tablesync_sync::{EntityRegistry, SyncResult};

/// Registry for every entity type a manifest declares. `data_dir`, when
/// given, replaces the manifest's data directory.
pub fn build_registry(
    manifest: &Manifest,
    data_dir: Option<PathBuf>,
) -> SyncResult<EntityRegistry> {
    let mut config = manifest.sync_config();
    if let Some(dir) = data_dir {
        config.data_dir = Some(dir);
    }
    EntityRegistry::from_definitions(config, manifest.entities.iter().cloned())
}

/// Database file to open: the command-line flag wins over the manifest.
pub fn database_path(manifest: &Manifest, flag: Option<PathBuf>) -> Option<PathBuf> {
    flag.or_else(|| manifest.settings.database.clone())
}

/// Outcome of synchronizing one entity type.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct EntitySummary {
    pub entity: String,
    pub created: usize,
    pub updated: usize,
    pub elapsed_ms: u64,
}

impl EntitySummary {
    pub fn new(entity: &str, changes: &[ChangeRecord], elapsed: Duration) -> Self {
        let created = changes.iter().filter(|c| c.is_created()).count();
        Self {
            entity: entity.to_string(),
            created,
            updated: changes.len() - created,
            elapsed_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

impl fmt::Display for EntitySummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<24} {:>5} created {:>5} updated {:>7} ms",
            self.entity, self.created, self.updated, self.elapsed_ms
        )
    }
}

/// Outcome of a full run, in synchronization order.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct RunSummary {
    pub entities: Vec<EntitySummary>,
}

impl RunSummary {
    pub fn push(&mut self, summary: EntitySummary) {
        self.entities.push(summary);
    }

    pub fn created(&self) -> usize {
        self.entities.iter().map(|e| e.created).sum()
    }

    pub fn updated(&self) -> usize {
        self.entities.iter().map(|e| e.updated).sum()
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.entities.iter().map(|e| e.elapsed_ms).sum()
    }
}
