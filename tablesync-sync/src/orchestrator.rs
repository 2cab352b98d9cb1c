//! Runs the synchronizer over every entity type in dependency order.

use crate::error::SyncResult;
use crate::resolver::DependencyResolver;
use crate::synchronizer::Synchronizer;
use indexmap::IndexMap;
use std::time::{Duration, Instant};
use tablesync_model::ChangeRecord;
use tracing::info;

/// Change records of a full run, keyed by entity type in the order the types
/// were synchronized.
pub type SyncReport = IndexMap<String, Vec<ChangeRecord>>;

/// Synchronizes all participating entity types, one after another.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    synchronizer: Synchronizer,
}

impl Orchestrator {
    pub fn new(synchronizer: Synchronizer) -> Self {
        Self { synchronizer }
    }

    pub fn synchronizer(&self) -> &Synchronizer {
        &self.synchronizer
    }

    /// Entity types a run would synchronize, in order.
    pub fn plan<S: AsRef<str>>(&self, explicit: &[S]) -> SyncResult<Vec<String>> {
        DependencyResolver::new(self.synchronizer.registry()).resolve_all(explicit)
    }

    /// Synchronizes every participating type plus `explicit`.
    ///
    /// Stops at the first type that fails. Types synchronized before it stay
    /// committed; types after it are not touched.
    pub fn sync_all<S: AsRef<str>>(&self, explicit: &[S]) -> SyncResult<SyncReport> {
        self.sync_all_with_progress(explicit, |_, _, _| {})
    }

    /// Like [`Orchestrator::sync_all`], calling `progress` after each type
    /// with its change records and elapsed time.
    pub fn sync_all_with_progress<S, F>(
        &self,
        explicit: &[S],
        mut progress: F,
    ) -> SyncResult<SyncReport>
    where
        S: AsRef<str>,
        F: FnMut(&str, &[ChangeRecord], Duration),
    {
        let order = self.plan(explicit)?;
        info!("Synchronizing {} entity types", order.len());

        let started = Instant::now();
        let mut report = SyncReport::with_capacity(order.len());
        for entity in order {
            let start = Instant::now();
            let changes = self.synchronizer.sync(&entity)?;
            let elapsed = start.elapsed();
            info!("{} synchronized in {:.2?}", entity, elapsed);
            progress(&entity, &changes, elapsed);
            report.insert(entity, changes);
        }
        info!("Synchronized {} entity types in {:.2?}", report.len(), started.elapsed());
        Ok(report)
    }
}
