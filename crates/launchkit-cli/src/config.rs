use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use semver::Version;
use serde::Deserialize;

pub(crate) const DEFAULT_UPDATE_CHANNEL_URL: &str = "https://apps.launchkit.dev/releases";

/// Optional `config.toml` at the launcher root. Absent file means defaults;
/// a malformed file is an error rather than a silent fallback.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub(crate) struct LauncherConfig {
    #[serde(default)]
    pub update_channel_url: Option<String>,
    #[serde(default)]
    pub companion_version: Option<Version>,
    #[serde(default)]
    pub plain_output: bool,
}

impl LauncherConfig {
    pub(crate) fn load(path: &Path) -> Result<Self> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("failed reading config: {}", path.display()))
            }
        };

        toml::from_str(&raw).with_context(|| format!("failed parsing config: {}", path.display()))
    }

    pub(crate) fn update_channel_url(&self) -> &str {
        self.update_channel_url
            .as_deref()
            .unwrap_or(DEFAULT_UPDATE_CHANNEL_URL)
    }

    pub(crate) fn companion_version(&self) -> Version {
        self.companion_version
            .clone()
            .unwrap_or_else(|| Version::new(0, 0, 0))
    }
}
