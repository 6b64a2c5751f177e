//! jvmcompat core library
//!
//! Decides whether a build agent's Java runtime is compatible with the
//! controller's and reconciles the agent's administrative state:
//!
//! - [`version`]: version identifiers and `major.minor` extraction
//! - [`probe`]: controller bytecode level (class file header, release table)
//! - [`comparator`]: the three [`ComparisonPolicy`] algorithms
//! - [`reactor`]: online/offline reconciliation with offline-cause ownership
//! - [`monitor`] / [`remoting`]: per-worker checks and fleet sweeps

pub mod comparator;
pub mod config;
pub mod error;
pub mod fakes;
pub mod monitor;
pub mod obs;
pub mod policy;
pub mod probe;
pub mod reactor;
pub mod remoting;
pub mod render;
pub mod source;
pub mod telemetry;
pub mod version;

pub use comparator::{
    at_least, exact_match, CompatibilityVerdict, ControllerRuntime, VersionComparator,
};
pub use config::{CompatConfig, ControllerConfig, MonitorConfig, RemotingMonitorConfig};
pub use error::{ClassFileError, CompatError, CompatResult};
pub use monitor::{sweep, JvmVersionMonitor, NodeMonitor, WorkerReport};
pub use obs::{
    check_span, emit_check_evaluated, emit_controller_unresolved, emit_mismatch_ignored,
    emit_probe_fallback, emit_unparseable_version, emit_worker_marked_offline,
    emit_worker_restored, CheckSpan,
};
pub use policy::ComparisonPolicy;
pub use probe::{
    level_for_release, parse_class_header, read_class_file_level, BytecodeLevel,
    BytecodeLevelProbe, ClassFileProbe, FixedLevelProbe, CLASS_FILE_MAGIC, RELEASE_TABLE,
};
pub use reactor::{
    CauseTrigger, CompatibilityReactor, OfflineCause, ReconcileOutcome, VersionPair, WorkerNode,
    WorkerState,
};
pub use remoting::{RemotingVersionMonitor, UNKNOWN_VERSION};
pub use render::{policy_choices, policy_description, wrap_error_span, NOT_AVAILABLE};
pub use source::{FetchedVersion, VersionSource};
pub use telemetry::{default_directives, init_tracing};
pub use version::{major_minor, VersionIdentifier};

/// jvmcompat version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
