//! Agent protocol (remoting) version monitor.
//!
//! Versions are opaque strings compared by equality. A worker that answers
//! without a version counts as a mismatch; an unreachable one is recorded
//! as [`UNKNOWN_VERSION`] and left alone.

use async_trait::async_trait;
use tracing::Instrument;

use crate::comparator::CompatibilityVerdict;
use crate::config::RemotingMonitorConfig;
use crate::error::CompatResult;
use crate::monitor::{NodeMonitor, WorkerReport};
use crate::obs;
use crate::reactor::{CauseTrigger, CompatibilityReactor, VersionPair, WorkerNode};
use crate::render::{self, NOT_AVAILABLE};
use crate::source::{FetchedVersion, VersionSource};

/// Recorded version of a worker that could not be reached.
pub const UNKNOWN_VERSION: &str = "unknown-version";

const UNREPORTED: &str = "unreported";
const REMOTING_CHECK: &str = "REMOTING_VERSION_EQUALS";

#[derive(Debug, Clone)]
pub struct RemotingVersionMonitor {
    config: RemotingMonitorConfig,
    reactor: CompatibilityReactor,
}

impl RemotingVersionMonitor {
    pub fn new(config: RemotingMonitorConfig) -> Self {
        Self {
            config,
            reactor: CompatibilityReactor::new(CauseTrigger::RemotingVersion),
        }
    }

    pub fn controller_version(&self) -> &str {
        &self.config.controller_version
    }

    pub fn evaluate(&self, version: Option<&str>) -> CompatibilityVerdict {
        CompatibilityVerdict::from_bool(version == Some(self.controller_version()))
    }

    pub fn to_html(&self, version: Option<&str>) -> String {
        match version {
            None => NOT_AVAILABLE.to_string(),
            Some(v) => render::version_cell(v, self.evaluate(Some(v)).is_compatible()),
        }
    }

    async fn check_worker(
        &self,
        worker: &dyn WorkerNode,
        source: &dyn VersionSource,
    ) -> CompatResult<WorkerReport> {
        let mut report = WorkerReport::new(worker.name());
        let version = match source.fetch_version(worker.name()).await? {
            FetchedVersion::Unreachable => {
                report.version = Some(UNKNOWN_VERSION.to_string());
                return Ok(report);
            }
            FetchedVersion::Unreported => None,
            FetchedVersion::Reported(v) => Some(v),
        };

        let verdict = self.evaluate(version.as_deref());
        obs::emit_check_evaluated(
            worker.name(),
            REMOTING_CHECK,
            version.as_deref().unwrap_or(UNREPORTED),
            verdict.is_compatible(),
        );
        let versions = VersionPair::new(
            self.controller_version(),
            version.as_deref().unwrap_or(UNREPORTED),
        );
        let outcome = self
            .reactor
            .reconcile(worker, verdict, self.config.ignore_mismatches, &versions)
            .await?;

        report.version = version;
        report.verdict = Some(verdict);
        report.outcome = Some(outcome);
        Ok(report)
    }
}

#[async_trait]
impl NodeMonitor for RemotingVersionMonitor {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::wrap_error_span;

    fn monitor() -> RemotingVersionMonitor {
        RemotingVersionMonitor::new(RemotingMonitorConfig {
            controller_version: "3206.vb_15dcf73f6a_9".to_string(),
            ignore_mismatches: false,
        })
    }

    #[test]
    fn test_to_html() {
        let m = monitor();
        assert_eq!(m.to_html(None), "N/A");
        assert_eq!(m.to_html(Some("3206.vb_15dcf73f6a_9")), "3206.vb_15dcf73f6a_9");
        assert_eq!(
            m.to_html(Some("different-version")),
            wrap_error_span("different-version")
        );
    }

    #[test]
    fn test_evaluate_is_plain_equality() {
        let m = monitor();
        assert!(m.evaluate(Some("3206.vb_15dcf73f6a_9")).is_compatible());
        assert!(m.evaluate(Some("3206.vb_15dcf73f6a_9 ")).is_incompatible());
        assert!(m.evaluate(None).is_incompatible());
    }
}
