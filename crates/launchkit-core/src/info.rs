use std::collections::BTreeMap;

use semver::Version;
use serde::{Deserialize, Serialize};

use crate::identity::AppIdentity;
use crate::manifest::{AppDescriptor, VersionArtifact};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct InstalledApp {
    pub path: String,
    pub version: Version,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish_timestamp: Option<u64>,
}

/// The merged catalog entry for one app: remote fields refreshed on every
/// catalog fetch, `installed` mutated only by the installation lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AppInfo {
    #[serde(flatten)]
    pub identity: AppIdentity,
    pub display_name: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub homepage: Option<String>,
    pub icon_url: String,
    pub release_notes_url: String,
    pub latest_version: Version,
    pub versions: BTreeMap<Version, VersionArtifact>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installed: Option<InstalledApp>,
}

impl AppInfo {
    pub fn from_descriptor(source: &str, descriptor: AppDescriptor) -> Self {
        Self {
            identity: AppIdentity::new(source, descriptor.name),
            display_name: descriptor.display_name,
            description: descriptor.description,
            homepage: descriptor.homepage,
            icon_url: descriptor.icon_url,
            release_notes_url: descriptor.release_notes_url,
            latest_version: descriptor.latest_version,
            versions: descriptor.versions,
            installed: None,
        }
    }

    pub fn artifact_for(&self, version: &Version) -> Option<&VersionArtifact> {
        self.versions.get(version)
    }

    pub fn is_upgradable(&self) -> bool {
        self.installed
            .as_ref()
            .map(|installed| installed.version < self.latest_version)
            .unwrap_or(false)
    }
}
