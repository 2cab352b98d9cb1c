//! Registered entity types and their lazily computed lookups.

use crate::error::{SyncError, SyncResult};
use crate::handler::EntityHandler;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, OnceLock};
use tablesync_model::{EntityDefinition, NamedInstances, SyncConfig};
use tablesync_source::{CanonicalLoader, SourceResult};
use tracing::{debug, warn};

/// One registered entity type.
///
/// The resolved key attribute, the dependency list and the named-instance
/// table are computed on first use and cached; racing first uses may both
/// compute, but only one result is ever stored.
pub struct RegisteredEntity {
    definition: EntityDefinition,
    handler: Option<Arc<dyn EntityHandler>>,
    key_attribute: OnceLock<String>,
    dependencies: OnceLock<Vec<String>>,
    named_instances: OnceLock<NamedInstances>,
}

impl RegisteredEntity {
    fn new(definition: EntityDefinition, handler: Option<Arc<dyn EntityHandler>>) -> Self {
        Self {
            definition,
            handler,
            key_attribute: OnceLock::new(),
            dependencies: OnceLock::new(),
            named_instances: OnceLock::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub fn definition(&self) -> &EntityDefinition {
        &self.definition
    }

    pub fn handler(&self) -> Option<&dyn EntityHandler> {
        self.handler.as_deref()
    }

    /// Named-instance table, loaded from the data files on first use.
    pub fn named_instances(&self, loader: &CanonicalLoader) -> SourceResult<&NamedInstances> {
        if let Some(named) = self.named_instances.get() {
            return Ok(named);
        }
        let named = loader.named_instances(&self.definition)?;
        Ok(self.named_instances.get_or_init(|| named))
    }
}

impl std::fmt::Debug for RegisteredEntity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredEntity")
            .field("definition", &self.definition)
            .field("has_handler", &self.handler.is_some())
            .finish_non_exhaustive()
    }
}

/// All entity types known to a sync run, keyed and iterated by name.
#[derive(Debug, Default)]
pub struct EntityRegistry {
    config: SyncConfig,
    entries: BTreeMap<String, RegisteredEntity>,
}

impl EntityRegistry {
    pub fn new(config: SyncConfig) -> Self {
        Self {
            config,
            entries: BTreeMap::new(),
        }
    }

    /// Builds a registry from a list of definitions.
    pub fn from_definitions(
        config: SyncConfig,
        definitions: impl IntoIterator<Item = EntityDefinition>,
    ) -> SyncResult<Self> {
        let mut registry = Self::new(config);
        for definition in definitions {
            registry.register(definition)?;
        }
        Ok(registry)
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn register(&mut self, definition: EntityDefinition) -> SyncResult<()> {
        self.insert(RegisteredEntity::new(definition, None))
    }

    pub fn register_with_handler(
        &mut self,
        definition: EntityDefinition,
        handler: Arc<dyn EntityHandler>,
    ) -> SyncResult<()> {
        self.insert(RegisteredEntity::new(definition, Some(handler)))
    }

    fn insert(&mut self, entry: RegisteredEntity) -> SyncResult<()> {
        let name = entry.name().to_string();
        if self.entries.contains_key(&name) {
            return Err(SyncError::Configuration(format!(
                "entity type {name:?} is already registered"
            )));
        }
        // A new type can turn previously ignored references into edges.
        for existing in self.entries.values_mut() {
            existing.dependencies.take();
        }
        debug!("Registered entity type {} (table {})", name, entry.definition.table);
        self.entries.insert(name, entry);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&RegisteredEntity> {
        self.entries.get(name)
    }

    pub fn require(&self, name: &str) -> SyncResult<&RegisteredEntity> {
        self.get(name)
            .ok_or_else(|| SyncError::Configuration(format!("unknown entity type {name:?}")))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// All registered names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Names of types that have data sources, sorted.
    pub fn participants(&self) -> impl Iterator<Item = &str> {
        self.entries
            .values()
            .filter(|e| e.definition.participates())
            .map(RegisteredEntity::name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolved key attribute of a type.
    pub fn key_attribute(&self, name: &str) -> SyncResult<&str> {
        let entry = self.require(name)?;
        Ok(entry
            .key_attribute
            .get_or_init(|| entry.definition.resolve_key_attribute(&self.config))
            .as_str())
    }

    /// Types that must be synchronized before `name`, sorted by name.
    ///
    /// References count when their target is a registered participant other
    /// than the type itself; anything else is silently skipped. Declared
    /// dependencies count whenever the target is registered.
    pub fn dependencies(&self, name: &str) -> SyncResult<&[String]> {
        let entry = self.require(name)?;
        Ok(entry
            .dependencies
            .get_or_init(|| self.compute_dependencies(&entry.definition))
            .as_slice())
    }

    fn compute_dependencies(&self, definition: &EntityDefinition) -> Vec<String> {
        let mut dependencies = BTreeSet::new();

        for reference in &definition.references {
            if reference.target == definition.name {
                continue;
            }
            match self.entries.get(&reference.target) {
                Some(target) if target.definition.participates() => {
                    dependencies.insert(reference.target.clone());
                }
                _ => debug!(
                    "{}: reference {} -> {} is not a synchronized type, ignoring",
                    definition.name, reference.column, reference.target
                ),
            }
        }

        for declared in &definition.dependencies {
            if declared == &definition.name {
                continue;
            }
            if self.entries.contains_key(declared) {
                dependencies.insert(declared.clone());
            } else {
                warn!(
                    "{}: declared dependency {} is not registered, ignoring",
                    definition.name, declared
                );
            }
        }

        dependencies.into_iter().collect()
    }
}
