//! Error taxonomy for runtime compatibility checks.

use thiserror::Error;

/// Errors produced by version parsing, probing and worker reconciliation.
#[derive(Debug, Error)]
pub enum CompatError {
    /// The version string does not match the dotted-numeric grammar.
    #[error("{raw:?} is not a supported JVM version pattern")]
    MalformedVersion { raw: String },

    /// The controller's bytecode level could not be determined by any means.
    #[error("controller bytecode level could not be determined: {0}")]
    ProbeExhausted(String),

    /// An administrative mutation on a worker failed.
    #[error("worker {worker}: {detail}")]
    Worker { worker: String, detail: String },

    /// Fetching a worker's self-reported version failed.
    #[error("version source failed for worker {worker}: {detail}")]
    VersionSource { worker: String, detail: String },

    /// Invalid configuration document.
    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl CompatError {
    pub(crate) fn malformed(raw: &str) -> Self {
        CompatError::MalformedVersion {
            raw: raw.to_string(),
        }
    }

    /// Whether this error is a parse failure of a version string.
    pub fn is_malformed_version(&self) -> bool {
        matches!(self, CompatError::MalformedVersion { .. })
    }
}

/// Errors from reading a class file header. These never leave the probe;
/// the probe falls back to its release table instead.
#[derive(Debug, Error)]
pub enum ClassFileError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("class file header truncated")]
    Truncated,

    #[error("bad class file magic 0x{0:08X}")]
    BadMagic(u32),

    #[error("unsupported class file major version {0}")]
    UnsupportedMajor(u16),
}

/// Convenience result alias.
pub type CompatResult<T> = std::result::Result<T, CompatError>;
