use std::collections::BTreeMap;

use anyhow::{anyhow, Context};
use semver::Version;
use serde::{Deserialize, Serialize};

use crate::archive::ArchiveType;

/// The `source.json` document a source publishes: its name plus the
/// descriptor URL of every app it lists.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceManifest {
    pub name: String,
    pub apps: Vec<String>,
}

impl SourceManifest {
    pub fn from_json_str(input: &str) -> anyhow::Result<Self> {
        let manifest: Self =
            serde_json::from_str(input).context("failed to parse source manifest")?;
        validate_catalog_name(&manifest.name)
            .with_context(|| format!("invalid source manifest name '{}'", manifest.name))?;
        for url in &manifest.apps {
            if url.trim().is_empty() {
                return Err(anyhow!(
                    "source manifest '{}' lists an empty app descriptor url",
                    manifest.name
                ));
            }
        }
        Ok(manifest)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VersionArtifact {
    pub tarball_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish_timestamp: Option<u64>,
}

/// The per-app descriptor document, fetched from the URL a source manifest
/// lists. Unknown fields are ignored so newer descriptor revisions stay
/// readable by older launchers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AppDescriptor {
    pub name: String,
    pub display_name: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub homepage: Option<String>,
    pub icon_url: String,
    pub release_notes_url: String,
    pub latest_version: Version,
    pub versions: BTreeMap<Version, VersionArtifact>,
}

impl AppDescriptor {
    pub fn from_json_str(input: &str) -> anyhow::Result<Self> {
        let descriptor: Self =
            serde_json::from_str(input).context("failed to parse app descriptor")?;
        descriptor.validate()?;
        Ok(descriptor)
    }

    fn validate(&self) -> anyhow::Result<()> {
        validate_catalog_name(&self.name)
            .with_context(|| format!("invalid app name '{}'", self.name))?;
        if self.versions.is_empty() {
            return Err(anyhow!("app '{}' declares no versions", self.name));
        }
        if !self.versions.contains_key(&self.latest_version) {
            return Err(anyhow!(
                "app '{}' latest version {} is missing from its version map",
                self.name,
                self.latest_version
            ));
        }
        for (version, artifact) in &self.versions {
            if artifact.tarball_url.trim().is_empty() {
                return Err(anyhow!(
                    "app '{}' version {} has an empty tarball url",
                    self.name,
                    version
                ));
            }
            if ArchiveType::infer_from_url(&artifact.tarball_url).is_none() {
                return Err(anyhow!(
                    "app '{}' version {} has an unsupported archive type: {}",
                    self.name,
                    version,
                    artifact.tarball_url
                ));
            }
        }
        Ok(())
    }
}

pub(crate) fn validate_catalog_name(name: &str) -> anyhow::Result<()> {
    if name.is_empty() || name.len() > 64 {
        return Err(anyhow!("name must be 1..=64 characters"));
    }

    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return Err(anyhow!("name must not be empty"));
    };
    let first_is_valid = first.is_ascii_lowercase() || first.is_ascii_digit();
    let rest_is_valid =
        chars.all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '-' || ch == '_');
    if !first_is_valid || !rest_is_valid {
        return Err(anyhow!("name must match [a-z0-9][a-z0-9_-]*"));
    }

    Ok(())
}
