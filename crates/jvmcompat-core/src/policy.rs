//! Comparison policies.
//!
//! Pure tags; human-readable descriptions live in [`crate::render`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CompatError;

/// How a worker's runtime version is judged against the controller's.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComparisonPolicy {
    /// Worker feature number must be at least the controller's bytecode tier.
    #[default]
    #[serde(alias = "RUNTIME_GREATER_OR_EQUAL_MASTER_BYTECODE")]
    RuntimeAtLeastControllerBytecode,
    /// Worker component ordering must be at least the controller's.
    MajorMinorMatch,
    /// Full structured equality, build metadata included.
    ExactMatch,
}

impl ComparisonPolicy {
    /// Every policy, in presentation order.
    pub const ALL: [ComparisonPolicy; 3] = [
        ComparisonPolicy::RuntimeAtLeastControllerBytecode,
        ComparisonPolicy::MajorMinorMatch,
        ComparisonPolicy::ExactMatch,
    ];

    /// Stable tag used in configuration files.
    pub fn as_str(&self) -> &'static str {
        match self {
            ComparisonPolicy::RuntimeAtLeastControllerBytecode => {
                "RUNTIME_AT_LEAST_CONTROLLER_BYTECODE"
            }
            ComparisonPolicy::MajorMinorMatch => "MAJOR_MINOR_MATCH",
            ComparisonPolicy::ExactMatch => "EXACT_MATCH",
        }
    }
}

impl fmt::Display for ComparisonPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComparisonPolicy {
    type Err = CompatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace('-', "_");
        match normalized.as_str() {
            "RUNTIME_AT_LEAST_CONTROLLER_BYTECODE" | "RUNTIME_GREATER_OR_EQUAL_MASTER_BYTECODE" => {
                Ok(ComparisonPolicy::RuntimeAtLeastControllerBytecode)
            }
            "MAJOR_MINOR_MATCH" => Ok(ComparisonPolicy::MajorMinorMatch),
            "EXACT_MATCH" => Ok(ComparisonPolicy::ExactMatch),
            _ => Err(CompatError::Config(format!("unknown comparison policy: {s}"))),
        }
    }
}
