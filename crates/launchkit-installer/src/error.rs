use launchkit_core::{AppIdentity, FetchFailure};
use launchkit_registry::RegistryError;
use semver::Version;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("an operation is already in progress for {0}")]
    AlreadyInProgress(AppIdentity),
    #[error("app {identity} has no version {version}")]
    UnknownVersion {
        identity: AppIdentity,
        version: Version,
    },
    #[error("app {0} is not installed")]
    NotInstalled(AppIdentity),
    #[error("unsupported archive type for {url}")]
    UnsupportedArchive { url: String },
    #[error("checksum mismatch for {identity}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        identity: AppIdentity,
        expected: String,
        actual: String,
    },
    #[error("download failed: {0}")]
    Fetch(#[from] FetchFailure),
    #[error("app-info store failure: {0}")]
    Store(#[from] RegistryError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}
