//! In-memory fakes for the worker and version-source boundaries.
//!
//! Provides `MemoryWorker` and `StaticVersionSource` that satisfy the trait
//! contracts without a live controller.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::error::{CompatError, CompatResult};
use crate::reactor::{OfflineCause, WorkerNode, WorkerState};
use crate::source::{FetchedVersion, VersionSource};

// ---------------------------------------------------------------------------
// MemoryWorker
// ---------------------------------------------------------------------------

/// A recorded administrative mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    Offline(OfflineCause),
    Online,
}

#[derive(Debug, Default)]
struct WorkerSlot {
    state: WorkerState,
    mutations: Vec<Mutation>,
}

/// Worker whose administrative state lives in memory.
#[derive(Debug)]
pub struct MemoryWorker {
    name: String,
    slot: Mutex<WorkerSlot>,
}

impl MemoryWorker {
    pub fn online(name: impl Into<String>) -> Self {
        Self::with_state(name, WorkerState::online())
    }

    pub fn with_state(name: impl Into<String>, state: WorkerState) -> Self {
        Self {
            name: name.into(),
            slot: Mutex::new(WorkerSlot {
                state,
                mutations: Vec::new(),
            }),
        }
    }

    fn slot(&self) -> MutexGuard<'_, WorkerSlot> {
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Current state.
    pub fn snapshot(&self) -> WorkerState {
        self.slot().state.clone()
    }

    /// Every mutation applied so far, oldest first.
    pub fn mutations(&self) -> Vec<Mutation> {
        self.slot().mutations.clone()
    }

    pub fn mutation_count(&self) -> usize {
        self.slot().mutations.len()
    }
}

#[async_trait]
impl WorkerNode for MemoryWorker {
    fn name(&self) -> &str {
        &self.name
    }

    async fn state(&self) -> CompatResult<WorkerState> {
        Ok(self.snapshot())
    }

    async fn set_offline(&self, cause: OfflineCause) -> CompatResult<()> {
        let mut slot = self.slot();
        slot.state = WorkerState::offline(cause.clone());
        slot.mutations.push(Mutation::Offline(cause));
        Ok(())
    }

    async fn set_online(&self) -> CompatResult<()> {
        let mut slot = self.slot();
        slot.state = WorkerState::online();
        slot.mutations.push(Mutation::Online);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// StaticVersionSource
// ---------------------------------------------------------------------------

/// Version source answering from a fixed table. Unknown workers are
/// unreachable; workers registered with `fail` return an error.
#[derive(Debug, Default)]
pub struct StaticVersionSource {
    versions: HashMap<String, FetchedVersion>,
    failing: HashMap<String, String>,
}

impl StaticVersionSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_version(mut self, worker: impl Into<String>, version: impl Into<String>) -> Self {
        self.versions
            .insert(worker.into(), FetchedVersion::Reported(version.into()));
        self
    }

    pub fn with_fetched(mut self, worker: impl Into<String>, fetched: FetchedVersion) -> Self {
        self.versions.insert(worker.into(), fetched);
        self
    }

    pub fn fail(mut self, worker: impl Into<String>, detail: impl Into<String>) -> Self {
        self.failing.insert(worker.into(), detail.into());
        self
    }
}

#[async_trait]
impl VersionSource for StaticVersionSource {
    async fn fetch_version(&self, worker: &str) -> CompatResult<FetchedVersion> {
        if let Some(detail) = self.failing.get(worker) {
            return Err(CompatError::VersionSource {
                worker: worker.to_string(),
                detail: detail.clone(),
            });
        }
        Ok(self
            .versions
            .get(worker)
            .cloned()
            .unwrap_or(FetchedVersion::Unreachable))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_worker_records_mutations() {
        let worker = MemoryWorker::online("agent-1");
        worker
            .set_offline(OfflineCause::other("operator", "maintenance"))
            .await
            .unwrap();
        worker.set_online().await.unwrap();

        assert_eq!(worker.snapshot(), WorkerState::online());
        let mutations = worker.mutations();
        assert_eq!(mutations.len(), 2);
        assert!(matches!(mutations[0], Mutation::Offline(_)));
        assert_eq!(mutations[1], Mutation::Online);
    }

    #[tokio::test]
    async fn test_static_source_defaults_to_unreachable() {
        let source = StaticVersionSource::new()
            .with_version("agent-1", "17.0.2")
            .fail("agent-2", "channel closed");

        assert_eq!(
            source.fetch_version("agent-1").await.unwrap(),
            FetchedVersion::Reported("17.0.2".to_string())
        );
        assert!(source.fetch_version("agent-2").await.is_err());
        assert_eq!(
            source.fetch_version("agent-3").await.unwrap(),
            FetchedVersion::Unreachable
        );
    }
}
