//! Dependency ordering of entity types.

use crate::error::{SyncError, SyncResult};
use crate::registry::EntityRegistry;
use std::collections::{BTreeSet, HashSet};
use tracing::debug;

/// Orders entity types so that every type comes after the types it depends
/// on.
///
/// Ordering works in levels. The requested types form the last level; the
/// dependencies of a level form the level before it. Leveling stops when a
/// level has no dependencies or repeats an earlier level, so cycles always
/// terminate. Levels are then read from first to last, keeping only the
/// first occurrence of each type. Within a level, types are sorted by name,
/// so the order never depends on the order names are passed in.
#[derive(Debug, Clone, Copy)]
pub struct DependencyResolver<'r> {
    registry: &'r EntityRegistry,
}

impl<'r> DependencyResolver<'r> {
    pub fn new(registry: &'r EntityRegistry) -> Self {
        Self { registry }
    }

    /// Dependency order of `names` and everything they depend on.
    pub fn order<S: AsRef<str>>(&self, names: &[S]) -> SyncResult<Vec<String>> {
        let mut base: Vec<String> = Vec::with_capacity(names.len());
        for name in names {
            let name = name.as_ref();
            if !self.registry.contains(name) {
                return Err(SyncError::Dependency(format!(
                    "unknown entity type {name:?}"
                )));
            }
            base.push(name.to_string());
        }
        base.sort();
        base.dedup();

        let mut levels = vec![base];
        let mut seen: HashSet<Vec<String>> = HashSet::new();
        loop {
            let Some(frontier) = levels.last() else {
                break;
            };
            seen.insert(frontier.clone());

            let mut dependencies = BTreeSet::new();
            for name in frontier {
                dependencies.extend(self.registry.dependencies(name)?.iter().cloned());
            }
            let dependencies: Vec<String> = dependencies.into_iter().collect();
            if dependencies.is_empty() || seen.contains(&dependencies) {
                break;
            }
            debug!("Dependency level {}: {:?}", levels.len(), dependencies);
            levels.push(dependencies);
        }

        let mut ordered = Vec::new();
        let mut placed = HashSet::new();
        for name in levels.into_iter().rev().flatten() {
            if placed.insert(name.clone()) {
                ordered.push(name);
            }
        }
        Ok(ordered)
    }

    /// Order for a full run: every participating type plus the `explicit`
    /// ones, even those without data sources.
    pub fn resolve_all<S: AsRef<str>>(&self, explicit: &[S]) -> SyncResult<Vec<String>> {
        let mut candidates: Vec<&str> = explicit.iter().map(AsRef::as_ref).collect();
        candidates.extend(self.registry.participants());
        self.order(&candidates)
    }
}
