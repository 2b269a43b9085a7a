mod archive;
mod error;
mod identity;
mod info;
mod manifest;

pub use archive::ArchiveType;
pub use error::FetchFailure;
pub use identity::AppIdentity;
pub use info::{AppInfo, InstalledApp};
pub use manifest::{AppDescriptor, SourceManifest, VersionArtifact};
