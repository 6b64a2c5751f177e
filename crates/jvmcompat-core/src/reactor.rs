//! Applies a verdict to a worker's administrative state.
//!
//! A [`CompatibilityReactor`] owns one [`CauseTrigger`]. It only ever puts a
//! worker back online when the recorded offline cause carries that same
//! trigger; offline states set by anyone else are left alone.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::comparator::CompatibilityVerdict;
use crate::error::CompatResult;
use crate::obs;

/// Component that recorded an offline cause.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum CauseTrigger {
    /// Java runtime version monitor.
    JvmVersion,
    /// Agent protocol (remoting) version monitor.
    RemotingVersion,
    /// Any other actor: an operator, a disk-space monitor, ...
    Other(String),
}

impl CauseTrigger {
    fn label(&self) -> &str {
        match self {
            CauseTrigger::JvmVersion => "JVM",
            CauseTrigger::RemotingVersion => "remoting",
            CauseTrigger::Other(name) => name,
        }
    }
}

impl fmt::Display for CauseTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CauseTrigger::JvmVersion => f.write_str("jvm_version"),
            CauseTrigger::RemotingVersion => f.write_str("remoting_version"),
            CauseTrigger::Other(name) => write!(f, "other:{}", name),
        }
    }
}

/// Why a worker is offline, tagged with who put it there.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfflineCause {
    pub trigger: CauseTrigger,
    pub message: String,
}

impl OfflineCause {
    pub fn new(trigger: CauseTrigger, message: impl Into<String>) -> Self {
        Self {
            trigger,
            message: message.into(),
        }
    }

    /// Offline cause recorded by an unrelated actor.
    pub fn other(actor: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(CauseTrigger::Other(actor.into()), message)
    }

    pub fn is_owned_by(&self, trigger: &CauseTrigger) -> bool {
        &self.trigger == trigger
    }
}

impl fmt::Display for OfflineCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Administrative state of a worker.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerState {
    pub offline: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<OfflineCause>,
}

impl WorkerState {
    pub fn online() -> Self {
        Self::default()
    }

    pub fn offline(cause: OfflineCause) -> Self {
        Self {
            offline: true,
            cause: Some(cause),
        }
    }

    fn offline_owned_by(&self, trigger: &CauseTrigger) -> bool {
        self.offline
            && self
                .cause
                .as_ref()
                .is_some_and(|cause| cause.is_owned_by(trigger))
    }
}

/// A remote worker whose administrative state can be read and mutated.
///
/// Implementations serialise their own mutations; the reactor issues at most
/// one mutation per call.
#[async_trait]
pub trait WorkerNode: Send + Sync {
    fn name(&self) -> &str;

    async fn state(&self) -> CompatResult<WorkerState>;

    async fn set_offline(&self, cause: OfflineCause) -> CompatResult<()>;

    async fn set_online(&self) -> CompatResult<()>;
}

/// Version strings quoted in a mismatch cause.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionPair {
    pub controller: String,
    pub worker: String,
}

impl VersionPair {
    pub fn new(controller: impl Into<String>, worker: impl Into<String>) -> Self {
        Self {
            controller: controller.into(),
            worker: worker.into(),
        }
    }
}

/// Transition taken by one [`CompatibilityReactor::reconcile`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileOutcome {
    MarkedOffline,
    Restored,
    Unchanged,
}

/// Drives the online/offline transition for one monitor.
#[derive(Debug, Clone)]
pub struct CompatibilityReactor {
    trigger: CauseTrigger,
}

impl CompatibilityReactor {
    pub fn new(trigger: CauseTrigger) -> Self {
        Self { trigger }
    }

    pub fn trigger(&self) -> &CauseTrigger {
        &self.trigger
    }

    /// Offline cause this reactor records on a mismatch.
    pub fn mismatch_cause(&self, worker: &str, versions: &VersionPair) -> OfflineCause {
        OfflineCause::new(
            self.trigger.clone(),
            format!(
                "{} version mismatch: agent {} runs {}, controller runs {}",
                self.trigger.label(),
                worker,
                versions.worker,
                versions.controller,
            ),
        )
    }

    /// Bring the worker's state in line with `verdict`.
    ///
    /// - compatible: restore the worker if it is offline for this trigger.
    /// - incompatible: mark it offline unless it already is.
    /// - incompatible but ignored: restore it if offline for this trigger.
    pub async fn reconcile(
        &self,
        worker: &dyn WorkerNode,
        verdict: CompatibilityVerdict,
        ignore_mismatches: bool,
        versions: &VersionPair,
    ) -> CompatResult<ReconcileOutcome> {
        let state = worker.state().await?;

        if verdict.is_incompatible() && !ignore_mismatches {
            if state.offline {
                return Ok(ReconcileOutcome::Unchanged);
            }
            obs::emit_worker_marked_offline(worker.name(), &versions.controller, &versions.worker);
            worker
                .set_offline(self.mismatch_cause(worker.name(), versions))
                .await?;
            return Ok(ReconcileOutcome::MarkedOffline);
        }

        if verdict.is_incompatible() {
            obs::emit_mismatch_ignored(worker.name());
        }

        if state.offline_owned_by(&self.trigger) {
            worker.set_online().await?;
            obs::emit_worker_restored(worker.name(), &self.trigger.to_string());
            return Ok(ReconcileOutcome::Restored);
        }
        Ok(ReconcileOutcome::Unchanged)
    }
}
