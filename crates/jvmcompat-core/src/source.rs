//! Inbound boundary: fetching a worker's self-reported version.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CompatResult;

/// What a worker reported when asked for its version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "version", rename_all = "snake_case")]
pub enum FetchedVersion {
    /// No channel to the worker.
    Unreachable,
    /// The worker answered but did not report a version.
    Unreported,
    Reported(String),
}

impl FetchedVersion {
    pub fn from_option(version: Option<String>) -> Self {
        match version {
            Some(v) => FetchedVersion::Reported(v),
            None => FetchedVersion::Unreported,
        }
    }

    pub fn as_reported(&self) -> Option<&str> {
        match self {
            FetchedVersion::Reported(v) => Some(v),
            _ => None,
        }
    }
}

/// Injectable data-source for worker versions.
///
/// Implement this trait over the remote-invocation channel, or use
/// [`crate::fakes::StaticVersionSource`] in tests.
#[async_trait]
pub trait VersionSource: Send + Sync {
    async fn fetch_version(&self, worker: &str) -> CompatResult<FetchedVersion>;
}
