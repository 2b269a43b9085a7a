use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use launchkit_core::{AppIdentity, ArchiveType};
use semver::Version;

/// Directory layout under the launcher root. Everything the launcher
/// persists lives below one prefix so a user can relocate or wipe it
/// wholesale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LauncherLayout {
    root: PathBuf,
}

impl LauncherLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn apps_dir(&self) -> PathBuf {
        self.root.join("apps")
    }

    pub fn app_dir(&self, identity: &AppIdentity) -> PathBuf {
        self.apps_dir().join(&identity.source).join(&identity.name)
    }

    pub fn state_dir(&self) -> PathBuf {
        self.root.join("state")
    }

    pub fn tmp_state_dir(&self) -> PathBuf {
        self.state_dir().join("tmp")
    }

    pub fn downloads_dir(&self) -> PathBuf {
        self.root.join("cache").join("downloads")
    }

    pub fn app_downloads_dir(&self, identity: &AppIdentity) -> PathBuf {
        self.downloads_dir()
            .join(&identity.source)
            .join(&identity.name)
    }

    pub fn download_cache_path(
        &self,
        identity: &AppIdentity,
        version: &Version,
        archive_type: ArchiveType,
    ) -> PathBuf {
        self.app_downloads_dir(identity)
            .join(format!("{version}.{}", archive_type.cache_extension()))
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.join("config.toml")
    }

    pub fn consent_path(&self) -> PathBuf {
        self.state_dir().join("consent")
    }

    pub fn token_path(&self) -> PathBuf {
        self.state_dir().join("credentials.token")
    }

    pub fn ensure_base_dirs(&self) -> Result<()> {
        for dir in [
            self.apps_dir(),
            self.state_dir(),
            self.tmp_state_dir(),
            self.downloads_dir(),
        ] {
            fs::create_dir_all(&dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
        }
        Ok(())
    }
}

pub fn default_user_root() -> Result<PathBuf> {
    if cfg!(windows) {
        let app_data = std::env::var("LOCALAPPDATA")
            .context("LOCALAPPDATA is not set; cannot resolve Windows launcher root")?;
        return Ok(PathBuf::from(app_data).join("Launchkit"));
    }

    let home = std::env::var("HOME").context("HOME is not set; cannot resolve launcher root")?;
    Ok(PathBuf::from(home).join(".launchkit"))
}
