//! Online/offline lifecycle driven by repeated verdicts.

use async_trait::async_trait;
use jvmcompat_core::fakes::{MemoryWorker, Mutation};
use jvmcompat_core::{
    CauseTrigger, CompatError, CompatResult, CompatibilityReactor, CompatibilityVerdict,
    OfflineCause, ReconcileOutcome, VersionPair, WorkerNode, WorkerState,
};

fn versions() -> VersionPair {
    VersionPair::new("17.0.2+8-LTS", "11.0.20+8")
}

#[tokio::test]
async fn repeated_mismatch_marks_offline_once() {
    let reactor = CompatibilityReactor::new(CauseTrigger::JvmVersion);
    let worker = MemoryWorker::online("agent-1");

    let first = reactor
        .reconcile(&worker, CompatibilityVerdict::Incompatible, false, &versions())
        .await
        .unwrap();
    let after_first = worker.snapshot();
    let second = reactor
        .reconcile(&worker, CompatibilityVerdict::Incompatible, false, &versions())
        .await
        .unwrap();

    assert_eq!(first, ReconcileOutcome::MarkedOffline);
    assert_eq!(second, ReconcileOutcome::Unchanged);
    assert_eq!(worker.snapshot(), after_first);
    assert_eq!(worker.mutation_count(), 1);
}

#[tokio::test]
async fn repeated_compatible_restores_once() {
    let reactor = CompatibilityReactor::new(CauseTrigger::JvmVersion);
    let worker = MemoryWorker::with_state(
        "agent-1",
        WorkerState::offline(reactor.mismatch_cause("agent-1", &versions())),
    );

    for _ in 0..3 {
        reactor
            .reconcile(&worker, CompatibilityVerdict::Compatible, false, &versions())
            .await
            .unwrap();
    }

    assert_eq!(worker.snapshot(), WorkerState::online());
    assert_eq!(worker.mutations(), vec![Mutation::Online]);
}

#[tokio::test]
async fn full_cycle_offline_then_upgrade_restores() {
    let reactor = CompatibilityReactor::new(CauseTrigger::JvmVersion);
    let worker = MemoryWorker::online("agent-1");

    reactor
        .reconcile(&worker, CompatibilityVerdict::Incompatible, false, &versions())
        .await
        .unwrap();
    let cause = worker.snapshot().cause.unwrap();
    assert!(cause.message.contains("11.0.20+8"));

    let upgraded = VersionPair::new("17.0.2+8-LTS", "17.0.9+9");
    let outcome = reactor
        .reconcile(&worker, CompatibilityVerdict::Compatible, false, &upgraded)
        .await
        .unwrap();

    assert_eq!(outcome, ReconcileOutcome::Restored);
    assert_eq!(
        worker.mutations(),
        vec![Mutation::Offline(cause), Mutation::Online]
    );
}

#[tokio::test]
async fn jvm_and_remoting_reactors_do_not_undo_each_other() {
    let jvm = CompatibilityReactor::new(CauseTrigger::JvmVersion);
    let remoting = CompatibilityReactor::new(CauseTrigger::RemotingVersion);
    let worker = MemoryWorker::online("agent-1");

    remoting
        .reconcile(&worker, CompatibilityVerdict::Incompatible, false, &versions())
        .await
        .unwrap();
    let outcome = jvm
        .reconcile(&worker, CompatibilityVerdict::Compatible, false, &versions())
        .await
        .unwrap();

    assert_eq!(outcome, ReconcileOutcome::Unchanged);
    let state = worker.snapshot();
    assert!(state.offline);
    assert!(state
        .cause
        .unwrap()
        .is_owned_by(&CauseTrigger::RemotingVersion));
}

#[tokio::test]
async fn operator_offline_survives_compatible_and_ignored_verdicts() {
    let reactor = CompatibilityReactor::new(CauseTrigger::JvmVersion);
    let cause = OfflineCause::other("operator", "rack maintenance");
    let worker = MemoryWorker::with_state("agent-1", WorkerState::offline(cause.clone()));

    for (verdict, ignore) in [
        (CompatibilityVerdict::Compatible, false),
        (CompatibilityVerdict::Incompatible, true),
        (CompatibilityVerdict::Incompatible, false),
    ] {
        let outcome = reactor
            .reconcile(&worker, verdict, ignore, &versions())
            .await
            .unwrap();
        assert_eq!(outcome, ReconcileOutcome::Unchanged);
    }

    assert_eq!(worker.snapshot(), WorkerState::offline(cause));
    assert_eq!(worker.mutation_count(), 0);
}

/// Worker whose state can be read but whose mutations are rejected.
struct LockedWorker;

#[async_trait]
impl WorkerNode for LockedWorker {
    fn name(&self) -> &str {
        "locked"
    }

    async fn state(&self) -> CompatResult<WorkerState> {
        Ok(WorkerState::online())
    }

    async fn set_offline(&self, _cause: OfflineCause) -> CompatResult<()> {
        Err(CompatError::Worker {
            worker: "locked".to_string(),
            detail: "permission denied".to_string(),
        })
    }

    async fn set_online(&self) -> CompatResult<()> {
        Ok(())
    }
}

#[tokio::test]
async fn mutation_failure_propagates() {
    let reactor = CompatibilityReactor::new(CauseTrigger::JvmVersion);
    let err = reactor
        .reconcile(
            &LockedWorker,
            CompatibilityVerdict::Incompatible,
            false,
            &versions(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, CompatError::Worker { .. }));
    assert!(err.to_string().contains("permission denied"));
}
