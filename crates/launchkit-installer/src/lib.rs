mod download;
mod error;
mod extract;
mod layout;
mod lifecycle;
mod progress;

pub use download::{ArtifactFetcher, DownloadStatus};
pub use error::LifecycleError;
pub use layout::{default_user_root, LauncherLayout};
pub use lifecycle::{InstallOutcome, InstallationLifecycle};
pub use progress::{
    CancelToken, InstallationProgress, NullSink, OperationPhase, OperationResult, ProgressSink,
};
