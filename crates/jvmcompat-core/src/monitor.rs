//! Per-worker JVM version checks and fleet sweeps.
//!
//! [`JvmVersionMonitor`] wires fetch → compare → reconcile for one worker.
//! [`sweep`] fans any [`NodeMonitor`] out over a fleet, one task per worker.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use tracing::{warn, Instrument};

use crate::comparator::{CompatibilityVerdict, ControllerRuntime, VersionComparator};
use crate::config::MonitorConfig;
use crate::error::CompatResult;
use crate::obs;
use crate::policy::ComparisonPolicy;
use crate::reactor::{
    CauseTrigger, CompatibilityReactor, ReconcileOutcome, VersionPair, WorkerNode,
};
use crate::render::{self, NOT_AVAILABLE};
use crate::source::VersionSource;
use crate::version::VersionIdentifier;

/// Result of checking one worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerReport {
    pub worker: String,
    /// Version value recorded for the worker; `None` when it could not be verified.
    pub version: Option<String>,
    pub verdict: Option<CompatibilityVerdict>,
    pub outcome: Option<ReconcileOutcome>,
    pub error: Option<String>,
    pub checked_at: DateTime<Utc>,
}

impl WorkerReport {
    pub fn new(worker: impl Into<String>) -> Self {
        Self {
            worker: worker.into(),
            version: None,
            verdict: None,
            outcome: None,
            error: None,
            checked_at: Utc::now(),
        }
    }

    pub fn failed(worker: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::new(worker)
        }
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

/// One kind of version check run against each worker of a fleet.
#[async_trait]
pub trait NodeMonitor: Send + Sync {
    async fn check(
        &self,
        worker: &dyn WorkerNode,
        source: &dyn VersionSource,
    ) -> CompatResult<WorkerReport>;
}

/// Run `monitor` against every worker concurrently.
///
/// Reports come back in input order. A worker name seen twice is checked
/// once; a failed check becomes a failed report and never aborts the sweep.
pub async fn sweep<M>(
    monitor: Arc<M>,
    workers: Vec<Arc<dyn WorkerNode>>,
    source: Arc<dyn VersionSource>,
) -> Vec<WorkerReport>
where
    M: NodeMonitor + 'static,
{
    let mut seen = HashSet::new();
    let mut names = Vec::new();
    let mut join_set = JoinSet::new();

    for worker in workers {
        if !seen.insert(worker.name().to_string()) {
            warn!(worker = %worker.name(), "duplicate worker in sweep, skipping");
            continue;
        }
        let idx = names.len();
        names.push(worker.name().to_string());

        let monitor = Arc::clone(&monitor);
        let source = Arc::clone(&source);
        join_set.spawn(async move {
            let report = monitor.check(worker.as_ref(), source.as_ref()).await;
            (idx, report)
        });
    }

    let mut slots: Vec<Option<WorkerReport>> = vec![None; names.len()];
    while let Some(joined) = join_set.join_next().await {
        match joined {
            Ok((idx, Ok(report))) => slots[idx] = Some(report),
            Ok((idx, Err(e))) => {
                warn!(worker = %names[idx], error = %e, "worker check failed");
                slots[idx] = Some(WorkerReport::failed(&names[idx], e.to_string()));
            }
            Err(e) => warn!(error = %e, "worker check task join error"),
        }
    }

    slots
        .into_iter()
        .zip(names)
        .map(|(slot, name)| {
            slot.unwrap_or_else(|| WorkerReport::failed(name, "check task did not complete"))
        })
        .collect()
}

/// Judges each worker's Java runtime against the controller's.
#[derive(Debug, Clone)]
pub struct JvmVersionMonitor {
    config: MonitorConfig,
    comparator: VersionComparator,
    reactor: CompatibilityReactor,
}

impl JvmVersionMonitor {
    pub fn new(config: MonitorConfig, controller: ControllerRuntime) -> Self {
        Self {
            config: config.normalize(),
            comparator: VersionComparator::new(controller),
            reactor: CompatibilityReactor::new(CauseTrigger::JvmVersion),
        }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn comparison_policy(&self) -> ComparisonPolicy {
        self.config.comparison_policy
    }

    pub fn reactor(&self) -> &CompatibilityReactor {
        &self.reactor
    }

    /// Verdict for a raw worker version under the configured policy.
    pub fn evaluate(&self, worker_version: &str) -> CompatResult<CompatibilityVerdict> {
        self.comparator
            .compare(worker_version, self.config.comparison_policy)
    }

    /// Version cell for display. Unknown or unparseable versions render
    /// `N/A`; incompatible ones are flagged.
    pub fn to_html(&self, version: Option<&str>) -> String {
        let Some(version) = version.filter(|v| *v != NOT_AVAILABLE) else {
            return NOT_AVAILABLE.to_string();
        };
        let verdict = VersionIdentifier::parse(version).and_then(|parsed| {
            self.comparator
                .compare_parsed(&parsed, self.config.comparison_policy)
        });
        match verdict {
            Ok(verdict) => render::version_cell(version, verdict.is_compatible()),
            Err(_) => NOT_AVAILABLE.to_string(),
        }
    }

    async fn check_worker(
        &self,
        worker: &dyn WorkerNode,
        source: &dyn VersionSource,
    ) -> CompatResult<WorkerReport> {
        let mut report = WorkerReport::new(worker.name());
        let fetched = source.fetch_version(worker.name()).await?;
        let Some(version) = fetched.as_reported() else {
            return Ok(report);
        };
        report.version = Some(version.to_string());

        // Controller-side problems surface as Config or ProbeExhausted and
        // propagate; only the worker's own string can be malformed here.
        let verdict = match self.evaluate(version) {
            Ok(verdict) => verdict,
            Err(e) if e.is_malformed_version() => {
                obs::emit_unparseable_version(version, &e);
                return Ok(report);
            }
            Err(e) => return Err(e),
        };
        obs::emit_check_evaluated(
            worker.name(),
            self.config.comparison_policy.as_str(),
            version,
            verdict.is_compatible(),
        );
        report.verdict = Some(verdict);

        let versions = VersionPair::new(self.comparator.controller().display_version(), version);
        let outcome = self
            .reactor
            .reconcile(worker, verdict, self.config.ignore_mismatches, &versions)
            .await?;
        report.outcome = Some(outcome);
        Ok(report)
    }
}

#[async_trait]
impl NodeMonitor for JvmVersionMonitor {
    async fn check(
        &self,
        worker: &dyn WorkerNode,
        source: &dyn VersionSource,
    ) -> CompatResult<WorkerReport> {
        self.check_worker(worker, source)
            .instrument(obs::check_span(worker.name()))
            .await
    }
}
