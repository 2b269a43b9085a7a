use std::path::PathBuf;

use launchkit_core::{AppIdentity, AppInfo, InstalledApp};
use serde::{Deserialize, Serialize};

use crate::fs_ops::{read_json_file, write_json_file};
use crate::RegistryError;

pub const APP_INFO_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppInfoFile {
    pub version: u32,
    pub apps: Vec<AppInfo>,
}

impl Default for AppInfoFile {
    fn default() -> Self {
        Self {
            version: APP_INFO_SCHEMA_VERSION,
            apps: Vec::new(),
        }
    }
}

/// Persisted app-info cache shared by the catalog refresh (remote fields)
/// and the installation lifecycle (`installed`). Every write is a full
/// snapshot behind a temp-file rename.
#[derive(Debug, Clone)]
pub struct AppInfoStore {
    state_dir: PathBuf,
}

impl AppInfoStore {
    pub fn new(state_dir: impl Into<PathBuf>) -> Self {
        Self {
            state_dir: state_dir.into(),
        }
    }

    pub fn app_info_path(&self) -> PathBuf {
        self.state_dir.join("app-info.json")
    }

    pub fn load(&self) -> Result<AppInfoFile, RegistryError> {
        let path = self.app_info_path();
        let Some(file) = read_json_file::<AppInfoFile>(&path)? else {
            return Ok(AppInfoFile::default());
        };
        if file.version != APP_INFO_SCHEMA_VERSION {
            return Err(RegistryError::schema(
                &path,
                format!("unsupported app-info schema version {}", file.version),
            ));
        }
        Ok(file)
    }

    pub fn save(&self, file: &AppInfoFile) -> Result<(), RegistryError> {
        let mut file = file.clone();
        file.apps.sort_by(|a, b| a.identity.cmp(&b.identity));
        write_json_file(&self.app_info_path(), &file)
    }

    pub fn get(&self, identity: &AppIdentity) -> Result<Option<AppInfo>, RegistryError> {
        Ok(self
            .load()?
            .apps
            .into_iter()
            .find(|app| &app.identity == identity))
    }

    pub fn local_apps(&self) -> Result<Vec<AppInfo>, RegistryError> {
        Ok(self
            .load()?
            .apps
            .into_iter()
            .filter(|app| app.installed.is_some())
            .collect())
    }

    /// Refresh remote fields from a fetch cycle. Matching entries keep their
    /// `installed` state; entries the cycle did not mention are left alone so
    /// one failing source never evicts its cached apps.
    pub fn upsert_remote(&self, apps: &[AppInfo]) -> Result<(), RegistryError> {
        let mut file = self.load()?;
        for fetched in apps {
            match file
                .apps
                .iter_mut()
                .find(|existing| existing.identity == fetched.identity)
            {
                Some(existing) => {
                    let installed = existing.installed.take();
                    *existing = fetched.clone();
                    existing.installed = installed;
                }
                None => file.apps.push(fetched.clone()),
            }
        }
        self.save(&file)
    }

    pub fn record_install(
        &self,
        app: &AppInfo,
        installed: InstalledApp,
    ) -> Result<(), RegistryError> {
        let mut file = self.load()?;
        match file
            .apps
            .iter_mut()
            .find(|existing| existing.identity == app.identity)
        {
            Some(existing) => existing.installed = Some(installed),
            None => {
                let mut entry = app.clone();
                entry.installed = Some(installed);
                file.apps.push(entry);
            }
        }
        self.save(&file)
    }

    pub fn clear_installed(&self, identity: &AppIdentity) -> Result<(), RegistryError> {
        let mut file = self.load()?;
        for existing in &mut file.apps {
            if &existing.identity == identity {
                existing.installed = None;
            }
        }
        self.save(&file)
    }

    /// Drop every cached entry belonging to `source`; returns the dropped
    /// entries so the caller can report what went away.
    pub fn remove_source_entries(&self, source: &str) -> Result<Vec<AppInfo>, RegistryError> {
        let mut file = self.load()?;
        let (dropped, kept): (Vec<_>, Vec<_>) = file
            .apps
            .into_iter()
            .partition(|app| app.identity.source == source);
        file.apps = kept;
        self.save(&file)?;
        Ok(dropped)
    }
}
