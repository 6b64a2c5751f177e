//! jvmcompat - controller/agent Java runtime compatibility checks
//!
//! ## Commands
//!
//! - `parse`: Parse a runtime version string
//! - `major-minor`: Print the `major.minor` prefix of a version
//! - `compare`: Judge one worker version against a controller version
//! - `probe`: Resolve the controller bytecode level
//! - `policies`: List the comparison policies
//! - `check`: Sweep a fleet described in JSON and reconcile its state

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use jvmcompat_core::fakes::{MemoryWorker, StaticVersionSource};
use jvmcompat_core::{
    emit_check_evaluated, policy_choices, sweep, BytecodeLevel, BytecodeLevelProbe, CheckSpan,
    ClassFileProbe, CompatConfig, ComparisonPolicy, CompatibilityVerdict, ControllerRuntime,
    FetchedVersion, JvmVersionMonitor, OfflineCause, RemotingVersionMonitor, VersionComparator,
    VersionIdentifier, WorkerNode, WorkerReport, WorkerState,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "jvmcompat")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Controller/agent Java runtime compatibility checks", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a runtime version string and print it as JSON
    Parse {
        /// Version string, e.g. 17.0.2+8-LTS
        version: String,
    },

    /// Print the major.minor prefix of a version string
    MajorMinor {
        /// Version string, e.g. 1.8.0_66
        version: String,
    },

    /// Compare a worker runtime version against the controller's
    Compare {
        /// Worker runtime version
        #[arg(short, long)]
        worker: String,

        /// Controller runtime version (or release with --legacy)
        #[arg(short, long)]
        controller: String,

        /// Comparison policy
        #[arg(short, long, env = "JVMCOMPAT_POLICY", default_value_t = ComparisonPolicy::default())]
        policy: ComparisonPolicy,

        /// Resolve the controller through the bytecode probe
        #[arg(long)]
        legacy: bool,

        /// Controller class file read by the legacy probe
        #[arg(long)]
        class_file: Option<PathBuf>,
    },

    /// Resolve the controller bytecode level
    Probe {
        /// Class file compiled for the controller
        #[arg(long)]
        class_file: Option<PathBuf>,

        /// Declared controller release, used when the class file is unusable
        #[arg(long)]
        release: Option<String>,
    },

    /// List comparison policies
    Policies,

    /// Run one sweep over a fleet and print reports and final states
    Check {
        /// Monitor configuration (TOML)
        #[arg(short, long)]
        config: PathBuf,

        /// Fleet description (JSON array of workers)
        #[arg(short, long)]
        fleet: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    jvmcompat_core::init_tracing(cli.json, level);

    match cli.command {
        Commands::Parse { version } => {
            println!("{}", serde_json::to_string_pretty(&cmd_parse(&version)?)?);
            Ok(())
        }
        Commands::MajorMinor { version } => {
            println!("{}", cmd_major_minor(&version)?);
            Ok(())
        }
        Commands::Compare {
            worker,
            controller,
            policy,
            legacy,
            class_file,
        } => {
            let verdict = cmd_compare(&worker, &controller, policy, legacy, class_file.as_deref())?;
            println!("{}", verdict);
            Ok(())
        }
        Commands::Probe {
            class_file,
            release,
        } => {
            let level = cmd_probe(class_file.as_deref(), release.as_deref())?;
            println!("major {} (Java {})", level.major(), level.feature());
            Ok(())
        }
        Commands::Policies => {
            for (description, tag) in policy_choices() {
                println!("{:<42} {}", tag, description);
            }
            Ok(())
        }
        Commands::Check { config, fleet } => {
            let summaries = cmd_check(&config, &fleet).await?;
            println!("{}", serde_json::to_string_pretty(&summaries)?);
            Ok(())
        }
    }
}

/// Parse a version and describe it
fn cmd_parse(raw: &str) -> Result<Value> {
    let version = VersionIdentifier::parse(raw)
        .with_context(|| format!("Failed to parse version '{}'", raw))?;
    Ok(serde_json::json!({
        "canonical": version.to_string(),
        "feature": version.feature(),
        "identifier": version,
    }))
}

fn cmd_major_minor(raw: &str) -> Result<String> {
    let prefix = jvmcompat_core::major_minor(raw)
        .with_context(|| format!("No major.minor prefix in '{}'", raw))?;
    Ok(prefix.to_string())
}

/// Judge one worker version against the controller
fn cmd_compare(
    worker: &str,
    controller: &str,
    policy: ComparisonPolicy,
    legacy: bool,
    class_file: Option<&Path>,
) -> Result<CompatibilityVerdict> {
    let _span = CheckSpan::enter(worker);

    let runtime = if legacy || class_file.is_some() {
        let mut probe = ClassFileProbe::new().with_release(controller);
        if let Some(path) = class_file {
            probe = probe.with_artifact(path);
        }
        ControllerRuntime::legacy(controller, Arc::new(probe))
    } else {
        ControllerRuntime::structured(controller)
            .with_context(|| format!("Invalid controller version '{}'", controller))?
    };

    let verdict = VersionComparator::new(runtime)
        .compare(worker, policy)
        .with_context(|| format!("Failed to compare '{}' under {}", worker, policy))?;
    emit_check_evaluated(worker, policy.as_str(), worker, verdict.is_compatible());
    Ok(verdict)
}

/// Resolve the controller bytecode level
fn cmd_probe(class_file: Option<&Path>, release: Option<&str>) -> Result<BytecodeLevel> {
    let mut probe = ClassFileProbe::new();
    if let Some(path) = class_file {
        probe = probe.with_artifact(path);
    }
    if let Some(release) = release {
        probe = probe.with_release(release);
    }
    probe
        .controller_level()
        .context("Failed to determine controller bytecode level")
}

/// One worker of a fleet file.
#[derive(Debug, Deserialize)]
struct FleetEntry {
    name: String,
    #[serde(default = "default_reachable")]
    reachable: bool,
    #[serde(default)]
    jvm_version: Option<String>,
    #[serde(default)]
    remoting_version: Option<String>,
    #[serde(default)]
    offline_cause: Option<OfflineCause>,
}

fn default_reachable() -> bool {
    true
}

impl FleetEntry {
    fn fetched(&self, version: &Option<String>) -> FetchedVersion {
        if self.reachable {
            FetchedVersion::from_option(version.clone())
        } else {
            FetchedVersion::Unreachable
        }
    }

    fn worker(&self) -> MemoryWorker {
        match &self.offline_cause {
            Some(cause) => MemoryWorker::with_state(&self.name, WorkerState::offline(cause.clone())),
            None => MemoryWorker::online(&self.name),
        }
    }
}

/// Per-worker result of `check`.
#[derive(Debug, Serialize)]
struct WorkerSummary {
    worker: String,
    jvm: Option<WorkerReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    remoting: Option<WorkerReport>,
    state: WorkerState,
}

fn by_worker(reports: Vec<WorkerReport>) -> HashMap<String, WorkerReport> {
    reports
        .into_iter()
        .map(|report| (report.worker.clone(), report))
        .collect()
}

/// Sweep a fleet with the JVM monitor and, when configured, the remoting monitor
async fn cmd_check(config_path: &Path, fleet_path: &Path) -> Result<Vec<WorkerSummary>> {
    let raw = std::fs::read_to_string(config_path)
        .with_context(|| format!("Failed to read config: {:?}", config_path))?;
    let config = CompatConfig::from_toml_str(&raw)
        .with_context(|| format!("Invalid config: {:?}", config_path))?;

    let raw = std::fs::read_to_string(fleet_path)
        .with_context(|| format!("Failed to read fleet: {:?}", fleet_path))?;
    let entries: Vec<FleetEntry> = serde_json::from_str(&raw)
        .with_context(|| format!("Invalid fleet description: {:?}", fleet_path))?;

    let workers: Vec<Arc<MemoryWorker>> = entries.iter().map(|e| Arc::new(e.worker())).collect();
    let nodes: Vec<Arc<dyn WorkerNode>> = workers
        .iter()
        .map(|w| Arc::clone(w) as Arc<dyn WorkerNode>)
        .collect();

    let runtime = config
        .jvm_runtime()
        .context("Invalid controller configuration")?;
    let jvm_monitor = Arc::new(JvmVersionMonitor::new(config.jvm.clone(), runtime));
    let jvm_source = entries.iter().fold(StaticVersionSource::new(), |source, e| {
        source.with_fetched(&e.name, e.fetched(&e.jvm_version))
    });

    info!(
        workers = nodes.len(),
        policy = %jvm_monitor.comparison_policy(),
        "Starting JVM version sweep"
    );
    let mut jvm_reports = by_worker(sweep(jvm_monitor, nodes.clone(), Arc::new(jvm_source)).await);

    let mut remoting_reports = match &config.remoting {
        Some(remoting) => {
            let source = entries.iter().fold(StaticVersionSource::new(), |source, e| {
                source.with_fetched(&e.name, e.fetched(&e.remoting_version))
            });
            let monitor = Arc::new(RemotingVersionMonitor::new(remoting.clone()));
            info!(workers = nodes.len(), "Starting remoting version sweep");
            by_worker(sweep(monitor, nodes, Arc::new(source)).await)
        }
        None => HashMap::new(),
    };

    let mut seen = HashSet::new();
    let summaries = workers
        .iter()
        .filter(|w| seen.insert(w.name().to_string()))
        .map(|w| WorkerSummary {
            worker: w.name().to_string(),
            jvm: jvm_reports.remove(w.name()),
            remoting: remoting_reports.remove(w.name()),
            state: w.snapshot(),
        })
        .collect();
    Ok(summaries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jvmcompat_core::{CauseTrigger, CLASS_FILE_MAGIC};
    use std::io::Write;

    #[test]
    fn test_parse_reports_feature() {
        let value = cmd_parse("1.8.0_66").unwrap();
        assert_eq!(value["feature"], 8);
        assert_eq!(value["canonical"], "1.8.0_66");
        assert!(cmd_parse("garbage").is_err());
    }

    #[test]
    fn test_major_minor() {
        assert_eq!(cmd_major_minor("1.8.0_66").unwrap(), "1.8");
        assert!(cmd_major_minor("17").is_err());
    }

    #[test]
    fn test_compare_structured() {
        let verdict = cmd_compare(
            "11.0.20+8",
            "17.0.2+8-LTS",
            ComparisonPolicy::RuntimeAtLeastControllerBytecode,
            false,
            None,
        )
        .unwrap();
        assert_eq!(verdict, CompatibilityVerdict::Incompatible);
    }

    #[test]
    fn test_compare_legacy_release() {
        let verdict = cmd_compare(
            "1.8.0_66",
            "1.7.0_80",
            ComparisonPolicy::RuntimeAtLeastControllerBytecode,
            true,
            None,
        )
        .unwrap();
        assert_eq!(verdict, CompatibilityVerdict::Compatible);
    }

    #[test]
    fn test_compare_malformed_worker_under_exact_match_fails() {
        let result = cmd_compare(
            "garbage",
            "17.0.2",
            ComparisonPolicy::ExactMatch,
            false,
            None,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_probe_class_file_then_release() {
        let mut class_file = tempfile::NamedTempFile::new().unwrap();
        let mut header = CLASS_FILE_MAGIC.to_be_bytes().to_vec();
        header.extend_from_slice(&[0, 0, 0, 51]);
        class_file.write_all(&header).unwrap();

        let level = cmd_probe(Some(class_file.path()), Some("1.8")).unwrap();
        assert_eq!(level, BytecodeLevel::JAVA_7);

        let level = cmd_probe(Some(Path::new("/nonexistent.class")), Some("1.8")).unwrap();
        assert_eq!(level, BytecodeLevel::JAVA_8);

        assert!(cmd_probe(None, None).is_err());
    }

    #[tokio::test]
    async fn test_check_sweeps_fleet() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("jvmcompat.toml");
        std::fs::write(
            &config_path,
            r#"
[controller]
runtime_version = "17.0.2+8-LTS"

[jvm]
comparison_policy = "RUNTIME_GREATER_OR_EQUAL_MASTER_BYTECODE"

[remoting]
controller_version = "3206.vb_15dcf73f6a_9"
"#,
        )
        .unwrap();

        let fleet_path = dir.path().join("fleet.json");
        std::fs::write(
            &fleet_path,
            r#"[
  {"name": "old", "jvm_version": "11.0.20+8", "remoting_version": "3206.vb_15dcf73f6a_9"},
  {"name": "current", "jvm_version": "17.0.9+9", "remoting_version": "3206.vb_15dcf73f6a_9"},
  {"name": "gone", "reachable": false},
  {"name": "parked", "jvm_version": "21.0.1+12", "remoting_version": "3206.vb_15dcf73f6a_9",
   "offline_cause": {"trigger": {"kind": "other", "name": "operator"}, "message": "maintenance"}}
]"#,
        )
        .unwrap();

        let summaries = cmd_check(&config_path, &fleet_path).await.unwrap();
        assert_eq!(summaries.len(), 4);

        let old = &summaries[0];
        assert!(old.state.offline);
        assert_eq!(
            old.state.cause.as_ref().unwrap().trigger,
            CauseTrigger::JvmVersion
        );

        assert!(!summaries[1].state.offline);

        let gone = &summaries[2];
        assert_eq!(gone.jvm.as_ref().unwrap().verdict, None);
        assert_eq!(
            gone.remoting.as_ref().unwrap().version.as_deref(),
            Some(jvmcompat_core::UNKNOWN_VERSION)
        );
        assert!(!gone.state.offline);

        let parked = &summaries[3];
        assert!(parked.state.offline);
        assert_eq!(parked.state.cause.as_ref().unwrap().message, "maintenance");
    }

    #[tokio::test]
    async fn test_check_rejects_strict_policy_without_controller_version() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("jvmcompat.toml");
        std::fs::write(
            &config_path,
            "[controller]\nclass_file = \"/opt/controller/Main.class\"\n\n[jvm]\ncomparison_policy = \"EXACT_MATCH\"\n",
        )
        .unwrap();
        let fleet_path = dir.path().join("fleet.json");
        std::fs::write(&fleet_path, r#"[{"name": "agent-1", "jvm_version": "1.6.0"}]"#).unwrap();

        let err = cmd_check(&config_path, &fleet_path).await.unwrap_err();
        assert!(format!("{:#}", err).contains("Invalid controller configuration"));
    }

    #[tokio::test]
    async fn test_check_rejects_missing_config() {
        let dir = tempfile::tempdir().unwrap();
        let result = cmd_check(&dir.path().join("missing.toml"), &dir.path().join("fleet.json")).await;
        assert!(result.is_err());
    }
}
