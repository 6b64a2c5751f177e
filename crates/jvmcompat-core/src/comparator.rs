//! Worker/controller version comparison.
//!
//! The controller side is a [`ControllerRuntime`], built once per process and
//! handed to every [`VersionComparator`]. Malformed input propagates under
//! [`ComparisonPolicy::ExactMatch`] and [`ComparisonPolicy::MajorMinorMatch`];
//! under [`ComparisonPolicy::RuntimeAtLeastControllerBytecode`] an unparseable
//! worker version is logged and judged incompatible.

use std::cmp::Ordering;
use std::fmt;
use std::sync::{Arc, OnceLock};

use serde::{Deserialize, Serialize};

use crate::error::{CompatError, CompatResult};
use crate::obs;
use crate::policy::ComparisonPolicy;
use crate::probe::{BytecodeLevel, BytecodeLevelProbe};
use crate::version::VersionIdentifier;

/// The controller's own runtime identity.
///
/// Clones share the legacy bytecode level, so a sweep judges every worker
/// against the same controller tier.
#[derive(Clone)]
pub enum ControllerRuntime {
    /// Structured runtime version; the feature number is read directly.
    Structured(VersionIdentifier),
    /// Loose release string; the feature tier comes from the probe.
    Legacy {
        release: String,
        /// `release` parsed, when it is a comparable version.
        identifier: Option<VersionIdentifier>,
        probe: Arc<dyn BytecodeLevelProbe>,
        /// Probe result, fixed on first use.
        level: Arc<OnceLock<Result<BytecodeLevel, String>>>,
    },
}

impl ControllerRuntime {
    /// Parse a structured controller runtime version.
    pub fn structured(raw: &str) -> CompatResult<Self> {
        Ok(ControllerRuntime::Structured(VersionIdentifier::parse(raw)?))
    }

    pub fn legacy(release: impl Into<String>, probe: Arc<dyn BytecodeLevelProbe>) -> Self {
        let release = release.into();
        ControllerRuntime::Legacy {
            identifier: VersionIdentifier::parse(&release).ok(),
            release,
            probe,
            level: Arc::new(OnceLock::new()),
        }
    }

    /// Version string used in operator-facing messages.
    pub fn display_version(&self) -> String {
        match self {
            ControllerRuntime::Structured(v) => v.to_string(),
            ControllerRuntime::Legacy { release, .. } => release.clone(),
        }
    }

    /// Whether the full-version policies can be applied.
    pub fn has_identifier(&self) -> bool {
        match self {
            ControllerRuntime::Structured(_) => true,
            ControllerRuntime::Legacy { identifier, .. } => identifier.is_some(),
        }
    }

    fn identifier(&self) -> CompatResult<&VersionIdentifier> {
        match self {
            ControllerRuntime::Structured(v) => Ok(v),
            ControllerRuntime::Legacy {
                release,
                identifier,
                ..
            } => identifier.as_ref().ok_or_else(|| {
                CompatError::Config(format!(
                    "controller release {release:?} is not a comparable version"
                ))
            }),
        }
    }

    /// Controller bytecode level; `None` for structured runtimes.
    ///
    /// The probe runs at most once per runtime. A failed probe stays failed
    /// and every later call reports `ProbeExhausted`.
    pub fn bytecode_level(&self) -> CompatResult<Option<BytecodeLevel>> {
        match self {
            ControllerRuntime::Structured(_) => Ok(None),
            ControllerRuntime::Legacy { probe, level, .. } => level
                .get_or_init(|| {
                    probe.controller_level().map_err(|e| match e {
                        CompatError::ProbeExhausted(reason) => reason,
                        other => other.to_string(),
                    })
                })
                .clone()
                .map(Some)
                .map_err(CompatError::ProbeExhausted),
        }
    }

    /// Feature number a worker must reach under the bytecode policy.
    pub fn required_feature(&self) -> CompatResult<u64> {
        match self {
            ControllerRuntime::Structured(v) => Ok(v.feature()),
            ControllerRuntime::Legacy { .. } => self
                .bytecode_level()?
                .map(|level| level.feature())
                .ok_or_else(|| CompatError::ProbeExhausted("no level resolved".to_string())),
        }
    }
}

impl fmt::Debug for ControllerRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControllerRuntime::Structured(v) => f.debug_tuple("Structured").field(v).finish(),
            ControllerRuntime::Legacy { release, level, .. } => f
                .debug_struct("Legacy")
                .field("release", release)
                .field("level", &level.get())
                .finish_non_exhaustive(),
        }
    }
}

/// Outcome of one comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompatibilityVerdict {
    Compatible,
    Incompatible,
}

impl CompatibilityVerdict {
    pub fn from_bool(compatible: bool) -> Self {
        if compatible {
            CompatibilityVerdict::Compatible
        } else {
            CompatibilityVerdict::Incompatible
        }
    }

    pub fn is_compatible(&self) -> bool {
        *self == CompatibilityVerdict::Compatible
    }

    pub fn is_incompatible(&self) -> bool {
        !self.is_compatible()
    }
}

impl fmt::Display for CompatibilityVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompatibilityVerdict::Compatible => f.write_str("compatible"),
            CompatibilityVerdict::Incompatible => f.write_str("incompatible"),
        }
    }
}

/// Structured equality, pre-release and build metadata included.
pub fn exact_match(worker: &VersionIdentifier, controller: &VersionIdentifier) -> bool {
    worker == controller
}

/// Worker component ordering is not below the controller's.
pub fn at_least(worker: &VersionIdentifier, controller: &VersionIdentifier) -> bool {
    worker.cmp_components(controller) != Ordering::Less
}

/// Applies a [`ComparisonPolicy`] against a fixed controller runtime.
#[derive(Debug, Clone)]
pub struct VersionComparator {
    controller: ControllerRuntime,
}

impl VersionComparator {
    pub fn new(controller: ControllerRuntime) -> Self {
        Self { controller }
    }

    pub fn controller(&self) -> &ControllerRuntime {
        &self.controller
    }

    /// Compare a raw worker version string against the controller.
    pub fn compare(
        &self,
        worker_version: &str,
        policy: ComparisonPolicy,
    ) -> CompatResult<CompatibilityVerdict> {
        match policy {
            ComparisonPolicy::RuntimeAtLeastControllerBytecode => {
                let worker = match VersionIdentifier::parse(worker_version) {
                    Ok(v) => v,
                    Err(e) => {
                        obs::emit_unparseable_version(worker_version, &e);
                        return Ok(CompatibilityVerdict::Incompatible);
                    }
                };
                self.compare_parsed(&worker, policy)
            }
            ComparisonPolicy::MajorMinorMatch | ComparisonPolicy::ExactMatch => {
                let worker = VersionIdentifier::parse(worker_version)?;
                self.compare_parsed(&worker, policy)
            }
        }
    }

    /// Compare an already parsed worker version against the controller.
    pub fn compare_parsed(
        &self,
        worker: &VersionIdentifier,
        policy: ComparisonPolicy,
    ) -> CompatResult<CompatibilityVerdict> {
        let compatible = match policy {
            ComparisonPolicy::RuntimeAtLeastControllerBytecode => {
                worker.feature() >= self.controller.required_feature()?
            }
            ComparisonPolicy::MajorMinorMatch => at_least(worker, self.controller.identifier()?),
            ComparisonPolicy::ExactMatch => exact_match(worker, self.controller.identifier()?),
        };
        Ok(CompatibilityVerdict::from_bool(compatible))
    }
}
