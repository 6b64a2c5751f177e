//! Structured observability hooks for compatibility checks.
//!
//! This module provides:
//! - Worker-scoped tracing spans via `check_span` (async) or the `CheckSpan`
//!   RAII guard (sync)
//! - Emission functions for the check lifecycle: verdict, offline, restore,
//!   ignored mismatch, unparseable input, probe fallback, unresolved
//!   controller
//!
//! Offline transitions are emitted at `warn!`; suppressed transitions at
//! `debug!` (configurable via `RUST_LOG`).

use std::path::Path;

use tracing::{debug, info, warn};

/// Worker-scoped span for one check; attach with `Instrument::instrument`.
pub fn check_span(worker: &str) -> tracing::Span {
    tracing::info_span!("jvmcompat.check", worker = %worker)
}

/// RAII guard that enters a worker-scoped tracing span for one check.
///
/// Not `Send`; use [`check_span`] inside async code.
///
/// # Example
///
/// ```ignore
/// let _span = CheckSpan::enter("agent-7");
/// // every event emitted now carries worker = "agent-7"
/// ```
pub struct CheckSpan {
    _span: tracing::span::EnteredSpan,
}

impl CheckSpan {
    /// Create and enter a span tagged with the worker name.
    pub fn enter(worker: &str) -> Self {
        Self {
            _span: check_span(worker).entered(),
        }
    }
}

/// Emit event: a verdict was computed for a worker.
///
/// `check` names the comparison applied, e.g. a policy tag.
pub fn emit_check_evaluated(worker: &str, check: &str, worker_version: &str, compatible: bool) {
    info!(
        event = "check.evaluated",
        worker = %worker,
        check = %check,
        worker_version = %worker_version,
        compatible = compatible,
    );
}

/// Emit event: worker marked offline for a version mismatch.
pub fn emit_worker_marked_offline(worker: &str, controller_version: &str, worker_version: &str) {
    warn!(
        event = "worker.marked_offline",
        worker = %worker,
        controller_version = %controller_version,
        worker_version = %worker_version,
        "marking agent {} offline: controller runs {}, agent runs {}",
        worker,
        controller_version,
        worker_version,
    );
}

/// Emit event: worker put back online after a mismatch this monitor raised.
pub fn emit_worker_restored(worker: &str, trigger: &str) {
    info!(event = "worker.restored", worker = %worker, trigger = %trigger);
}

/// Emit event: mismatch detected, but the monitor is configured to ignore it.
pub fn emit_mismatch_ignored(worker: &str) {
    debug!(
        event = "worker.mismatch_ignored",
        worker = %worker,
        "version incompatibility detected, keeping agent online per monitor configuration",
    );
}

/// Emit event: a version string could not be parsed (warning level).
pub fn emit_unparseable_version(raw: &str, error: &dyn std::fmt::Display) {
    warn!(
        event = "version.unparseable",
        raw = %raw,
        error = %error,
    );
}

/// Emit event: class file probe failed, falling back to the release table.
pub fn emit_probe_fallback(artifact: &Path, error: &dyn std::fmt::Display) {
    debug!(
        event = "probe.fallback",
        artifact = %artifact.display(),
        error = %error,
    );
}

/// Emit event: the controller's bytecode level could not be resolved at
/// startup; every bytecode-policy check will fail until restart.
pub fn emit_controller_unresolved(error: &dyn std::fmt::Display) {
    warn!(event = "controller.unresolved", error = %error);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_span_create() {
        // Just ensure CheckSpan::enter doesn't panic
        let _span = CheckSpan::enter("agent-under-test");
        emit_mismatch_ignored("agent-under-test");
    }
}
