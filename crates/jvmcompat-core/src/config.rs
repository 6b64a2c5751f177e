//! Monitor configuration model.
//!
//! ```toml
//! [controller]
//! runtime_version = "17.0.2+8-LTS"
//!
//! [jvm]
//! comparison_policy = "MAJOR_MINOR_MATCH"
//! ignore_mismatches = false
//!
//! [remoting]
//! controller_version = "3206.vb_15dcf73f6a_9"
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::comparator::ControllerRuntime;
use crate::error::{CompatError, CompatResult};
use crate::obs;
use crate::policy::ComparisonPolicy;
use crate::probe::ClassFileProbe;

/// Settings of the JVM version monitor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub comparison_policy: ComparisonPolicy,
    /// Keep incompatible workers online.
    pub ignore_mismatches: bool,
    /// Legacy inverse of `ignore_mismatches`; folded in by [`MonitorConfig::normalize`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disconnect: Option<bool>,
}

impl MonitorConfig {
    pub fn new(comparison_policy: ComparisonPolicy) -> Self {
        Self {
            comparison_policy,
            ..Self::default()
        }
    }

    /// Fold a legacy `disconnect` flag into `ignore_mismatches`.
    pub fn normalize(mut self) -> Self {
        if let Some(disconnect) = self.disconnect.take() {
            self.ignore_mismatches = !disconnect;
        }
        self
    }

    pub fn is_disconnect(&self) -> bool {
        !self.ignore_mismatches
    }

    pub fn set_disconnect(&mut self, disconnect: bool) {
        self.ignore_mismatches = !disconnect;
    }
}

/// Settings of the remoting (agent protocol) version monitor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemotingMonitorConfig {
    pub controller_version: String,
    #[serde(default)]
    pub ignore_mismatches: bool,
}

/// How to determine the controller's own runtime.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Structured runtime version, e.g. `17.0.2+8-LTS`.
    pub runtime_version: Option<String>,
    /// Declared release for the legacy probe.
    pub release: Option<String>,
    /// Controller class file for the legacy probe.
    pub class_file: Option<PathBuf>,
}

impl ControllerConfig {
    /// Build the controller context for `policy`.
    ///
    /// A structured version wins; otherwise the legacy probe is configured
    /// from `class_file` and `release` and resolved here, once. The
    /// full-version policies need a comparable controller version, so they
    /// reject a legacy controller whose release is missing or unparseable.
    pub fn runtime(&self, policy: ComparisonPolicy) -> CompatResult<ControllerRuntime> {
        if let Some(version) = &self.runtime_version {
            return ControllerRuntime::structured(version)
                .map_err(|e| CompatError::Config(format!("controller runtime_version: {e}")));
        }
        if self.release.is_none() && self.class_file.is_none() {
            return Err(CompatError::Config(
                "controller needs runtime_version, release or class_file".to_string(),
            ));
        }

        let mut probe = ClassFileProbe::new();
        if let Some(path) = &self.class_file {
            probe = probe.with_artifact(path);
        }
        if let Some(release) = &self.release {
            probe = probe.with_release(release);
        }
        let release = self.release.clone().unwrap_or_else(|| "unknown".to_string());
        let runtime = ControllerRuntime::legacy(release, Arc::new(probe));

        if policy != ComparisonPolicy::RuntimeAtLeastControllerBytecode && !runtime.has_identifier()
        {
            return Err(CompatError::Config(format!(
                "{policy} compares full versions; controller needs runtime_version or a parseable release"
            )));
        }
        if let Err(e) = runtime.bytecode_level() {
            obs::emit_controller_unresolved(&e);
        }
        Ok(runtime)
    }
}

/// Top-level configuration document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompatConfig {
    #[serde(default)]
    pub controller: ControllerConfig,
    #[serde(default)]
    pub jvm: MonitorConfig,
    #[serde(default)]
    pub remoting: Option<RemotingMonitorConfig>,
}

impl CompatConfig {
    /// Controller context for the configured JVM policy.
    pub fn jvm_runtime(&self) -> CompatResult<ControllerRuntime> {
        self.controller.runtime(self.jvm.comparison_policy)
    }

    pub fn from_toml_str(document: &str) -> CompatResult<Self> {
        let mut config: CompatConfig =
            toml::from_str(document).map_err(|e| CompatError::Config(e.to_string()))?;
        config.jvm = config.jvm.normalize();
        Ok(config)
    }
}
