//! Run Repository
//!
//! Holds pipeline run history. Runs move from the active set to the
//! archive when they reach a terminal step; both stay queryable. The archive
//! is bounded and drops its oldest runs first.

use async_trait::async_trait;
use sluice_core::domain::run::PipelineRun;
use std::collections::{HashMap, VecDeque};
use std::sync::RwLock;
use uuid::Uuid;

/// Storage for pipeline runs
#[async_trait]
pub trait RunRepository: Send + Sync {
    /// Inserts or replaces a run
    async fn save(&self, run: &PipelineRun);

    async fn find_by_id(&self, id: Uuid) -> Option<PipelineRun>;

    /// All runs, newest first
    async fn list_all(&self) -> Vec<PipelineRun>;

    /// Runs that have not reached a terminal step, newest first
    async fn list_active(&self) -> Vec<PipelineRun>;
}

/// Finished runs kept by [`InMemoryRunRepository::new`]
pub const DEFAULT_RUN_HISTORY_CAPACITY: usize = 1000;

#[derive(Default)]
struct Runs {
    active: HashMap<Uuid, PipelineRun>,
    archived: HashMap<Uuid, PipelineRun>,
    archive_order: VecDeque<Uuid>,
}

/// In-memory run repository
pub struct InMemoryRunRepository {
    capacity: usize,
    runs: RwLock<Runs>,
}

impl InMemoryRunRepository {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_RUN_HISTORY_CAPACITY)
    }

    /// Keeps at most `capacity` finished runs
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            runs: RwLock::new(Runs::default()),
        }
    }
}

impl Default for InMemoryRunRepository {
    fn default() -> Self {
        Self::new()
    }
}

fn newest_first(mut runs: Vec<PipelineRun>) -> Vec<PipelineRun> {
    runs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
    runs
}

#[async_trait]
impl RunRepository for InMemoryRunRepository {
    async fn save(&self, run: &PipelineRun) {
        let mut runs = self.runs.write().unwrap();
        if run.is_finished() {
            runs.active.remove(&run.id);
            if runs.archived.insert(run.id, run.clone()).is_none() {
                runs.archive_order.push_back(run.id);
            }

            while runs.archive_order.len() > self.capacity {
                if let Some(evicted) = runs.archive_order.pop_front() {
                    runs.archived.remove(&evicted);
                }
            }
        } else {
            runs.active.insert(run.id, run.clone());
        }
    }

    async fn find_by_id(&self, id: Uuid) -> Option<PipelineRun> {
        let runs = self.runs.read().unwrap();
        runs.active
            .get(&id)
            .or_else(|| runs.archived.get(&id))
            .cloned()
    }

    async fn list_all(&self) -> Vec<PipelineRun> {
        let runs = self.runs.read().unwrap();
        newest_first(
            runs.active
                .values()
                .chain(runs.archived.values())
                .cloned()
                .collect(),
        )
    }

    async fn list_active(&self) -> Vec<PipelineRun> {
        let runs = self.runs.read().unwrap();
        newest_first(runs.active.values().cloned().collect())
    }
}
