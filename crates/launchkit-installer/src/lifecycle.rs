use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{anyhow, Context};
use launchkit_core::{AppIdentity, AppInfo, ArchiveType, InstalledApp};
use launchkit_registry::AppInfoStore;
use launchkit_security::sha256_hex_file;
use semver::Version;

use crate::download::{download_to_cache, ArtifactFetcher, DownloadStatus};
use crate::error::LifecycleError;
use crate::extract::{extract_archive, extracted_content_root, make_tmp_dir, move_dir_or_copy};
use crate::layout::LauncherLayout;
use crate::progress::{
    CancelToken, InstallationProgress, OperationPhase, OperationResult, ProgressSink,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    Installed { version: Version, path: PathBuf },
    Cancelled,
}

/// Per-app install/upgrade/remove state machine. Exactly one non-idle
/// operation may be active per identity; operations on different identities
/// may run concurrently. All persisted mutation goes through the shared
/// app-info store behind `store_lock` so concurrent operations never lose
/// each other's snapshot writes.
pub struct InstallationLifecycle {
    layout: LauncherLayout,
    store: AppInfoStore,
    active: Mutex<HashMap<AppIdentity, InstallationProgress>>,
    store_lock: Mutex<()>,
}

/// Releases the identity's busy slot when the operation ends, however it
/// ends.
struct OperationGuard<'a> {
    lifecycle: &'a InstallationLifecycle,
    identity: AppIdentity,
}

impl Drop for OperationGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut active) = self.lifecycle.active.lock() {
            active.remove(&self.identity);
        }
    }
}

impl InstallationLifecycle {
    pub fn new(layout: LauncherLayout, store: AppInfoStore) -> Self {
        Self {
            layout,
            store,
            active: Mutex::new(HashMap::new()),
            store_lock: Mutex::new(()),
        }
    }

    pub fn layout(&self) -> &LauncherLayout {
        &self.layout
    }

    pub fn progress(&self, identity: &AppIdentity) -> InstallationProgress {
        self.active
            .lock()
            .ok()
            .and_then(|active| active.get(identity).copied())
            .unwrap_or_default()
    }

    pub fn install(
        &self,
        app: &AppInfo,
        version: &Version,
        fetcher: &dyn ArtifactFetcher,
        sink: &dyn ProgressSink,
        cancel: &CancelToken,
    ) -> Result<InstallOutcome, LifecycleError> {
        self.replace_install(app, version, OperationPhase::Installing, fetcher, sink, cancel)
    }

    /// Same mechanics as install, but requires an existing install: the
    /// previous version is only moved aside after the new version's staging
    /// extraction has succeeded, so a failed upgrade never leaves the app
    /// without a working install. Installing a non-latest version over an
    /// existing install goes through here too.
    pub fn upgrade(
        &self,
        app: &AppInfo,
        version: &Version,
        fetcher: &dyn ArtifactFetcher,
        sink: &dyn ProgressSink,
        cancel: &CancelToken,
    ) -> Result<InstallOutcome, LifecycleError> {
        if self.installed_record(&app.identity)?.is_none() {
            return Err(LifecycleError::NotInstalled(app.identity.clone()));
        }
        self.replace_install(app, version, OperationPhase::Upgrading, fetcher, sink, cancel)
    }

    pub fn remove(
        &self,
        identity: &AppIdentity,
        sink: &dyn ProgressSink,
    ) -> Result<(), LifecycleError> {
        let guard = self.begin(identity, OperationPhase::Removing)?;

        let result = self.remove_inner(identity);
        match &result {
            Ok(()) => sink.finished(identity, OperationResult::Ok),
            Err(err) => sink.finished(identity, OperationResult::Err(&err.to_string())),
        }
        drop(guard);
        result
    }

    /// Removing a source cascades to every app installed from it.
    pub fn remove_source_apps(
        &self,
        source: &str,
        sink: &dyn ProgressSink,
    ) -> Result<Vec<AppIdentity>, LifecycleError> {
        let installed: Vec<AppIdentity> = self
            .store
            .local_apps()?
            .into_iter()
            .filter(|app| app.identity.source == source)
            .map(|app| app.identity)
            .collect();

        for identity in &installed {
            self.remove(identity, sink)?;
        }
        Ok(installed)
    }

    fn remove_inner(&self, identity: &AppIdentity) -> Result<(), LifecycleError> {
        let Some(installed) = self.installed_record(identity)? else {
            return Err(LifecycleError::NotInstalled(identity.clone()));
        };

        // migrated installs may predate the per-source layout; trust the
        // recorded path over the computed one
        let recorded = PathBuf::from(&installed.path);
        let app_dir = if recorded.exists() {
            recorded
        } else {
            self.layout.app_dir(identity)
        };
        if app_dir.exists() {
            fs::remove_dir_all(&app_dir)
                .with_context(|| format!("failed to remove app dir: {}", app_dir.display()))
                .map_err(LifecycleError::Internal)?;
        }

        let downloads = self.layout.app_downloads_dir(identity);
        if downloads.exists() {
            fs::remove_dir_all(&downloads)
                .with_context(|| format!("failed to prune download cache: {}", downloads.display()))
                .map_err(LifecycleError::Internal)?;
        }

        let _store_guard = self.store_lock.lock();
        self.store.clear_installed(identity)?;
        Ok(())
    }

    fn replace_install(
        &self,
        app: &AppInfo,
        version: &Version,
        phase: OperationPhase,
        fetcher: &dyn ArtifactFetcher,
        sink: &dyn ProgressSink,
        cancel: &CancelToken,
    ) -> Result<InstallOutcome, LifecycleError> {
        let identity = &app.identity;
        let guard = self.begin(identity, phase)?;

        let result = self.replace_install_inner(app, version, fetcher, sink, cancel);
        match &result {
            Ok(InstallOutcome::Installed { .. }) => sink.finished(identity, OperationResult::Ok),
            Ok(InstallOutcome::Cancelled) => sink.finished(identity, OperationResult::Cancelled),
            Err(err) => sink.finished(identity, OperationResult::Err(&err.to_string())),
        }
        drop(guard);
        result
    }

    fn replace_install_inner(
        &self,
        app: &AppInfo,
        version: &Version,
        fetcher: &dyn ArtifactFetcher,
        sink: &dyn ProgressSink,
        cancel: &CancelToken,
    ) -> Result<InstallOutcome, LifecycleError> {
        let identity = &app.identity;
        let artifact = app
            .artifact_for(version)
            .ok_or_else(|| LifecycleError::UnknownVersion {
                identity: identity.clone(),
                version: version.clone(),
            })?;
        let archive_type = ArchiveType::infer_from_url(&artifact.tarball_url).ok_or_else(|| {
            LifecycleError::UnsupportedArchive {
                url: artifact.tarball_url.clone(),
            }
        })?;

        let cache_path = self.layout.download_cache_path(identity, version, archive_type);
        let mut on_percent = |percent: u8| {
            if let Some(effective) = self.bump_percent(identity, percent) {
                sink.progress(identity, effective);
            }
        };
        let status = download_to_cache(
            fetcher,
            &artifact.tarball_url,
            &cache_path,
            &mut on_percent,
            cancel,
        )?;
        if status == DownloadStatus::Cancelled {
            return Ok(InstallOutcome::Cancelled);
        }

        if let Some(expected) = &artifact.sha256 {
            self.verify_artifact(identity, &cache_path, expected)?;
        }

        let staging = make_tmp_dir(&self.layout, "install").map_err(LifecycleError::Internal)?;
        let result = self.extract_and_swap(app, version, archive_type, &cache_path, &staging);
        let _ = fs::remove_dir_all(&staging);
        result
    }

    /// Extract fully into staging, then swap into place. The pre-existing
    /// install is renamed to a sibling backup only after extraction has
    /// succeeded, and restored if the final swap fails, so a crash at any
    /// point leaves either the old install or the new one — never a half of
    /// each.
    fn extract_and_swap(
        &self,
        app: &AppInfo,
        version: &Version,
        archive_type: ArchiveType,
        cache_path: &std::path::Path,
        staging: &std::path::Path,
    ) -> Result<InstallOutcome, LifecycleError> {
        let identity = &app.identity;
        extract_archive(cache_path, staging, archive_type).map_err(LifecycleError::Internal)?;
        let content_root = extracted_content_root(staging).map_err(LifecycleError::Internal)?;

        let app_dir = self.layout.app_dir(identity);
        let backup = self.backup_path(identity)?;
        let had_existing = app_dir.exists();

        if had_existing {
            fs::rename(&app_dir, &backup)
                .with_context(|| {
                    format!("failed to move previous install aside: {}", app_dir.display())
                })
                .map_err(LifecycleError::Internal)?;
        }

        if let Err(err) = move_dir_or_copy(&content_root, &app_dir) {
            if had_existing {
                if let Err(restore_err) = fs::rename(&backup, &app_dir) {
                    return Err(LifecycleError::Internal(anyhow!(
                        "failed installing {}: {err:#}; failed restoring previous install from {}: {restore_err}",
                        app_dir.display(),
                        backup.display()
                    )));
                }
            }
            return Err(LifecycleError::Internal(err));
        }

        if had_existing {
            let _ = fs::remove_dir_all(&backup);
        }

        let installed = InstalledApp {
            path: app_dir.display().to_string(),
            version: version.clone(),
            publish_timestamp: app
                .artifact_for(version)
                .and_then(|artifact| artifact.publish_timestamp),
        };
        {
            let _store_guard = self.store_lock.lock();
            self.store.record_install(app, installed)?;
        }

        Ok(InstallOutcome::Installed {
            version: version.clone(),
            path: app_dir,
        })
    }

    fn verify_artifact(
        &self,
        identity: &AppIdentity,
        cache_path: &std::path::Path,
        expected: &str,
    ) -> Result<(), LifecycleError> {
        let actual = sha256_hex_file(cache_path).map_err(LifecycleError::Internal)?;
        if !actual.eq_ignore_ascii_case(expected) {
            let _ = fs::remove_file(cache_path);
            return Err(LifecycleError::ChecksumMismatch {
                identity: identity.clone(),
                expected: expected.to_string(),
                actual,
            });
        }
        Ok(())
    }

    fn begin(
        &self,
        identity: &AppIdentity,
        phase: OperationPhase,
    ) -> Result<OperationGuard<'_>, LifecycleError> {
        let mut active = self
            .active
            .lock()
            .map_err(|_| LifecycleError::Internal(anyhow!("operation registry poisoned")))?;
        if active.contains_key(identity) {
            return Err(LifecycleError::AlreadyInProgress(identity.clone()));
        }
        active.insert(
            identity.clone(),
            InstallationProgress { phase, percent: 0 },
        );
        Ok(OperationGuard {
            lifecycle: self,
            identity: identity.clone(),
        })
    }

    /// Clamp progress to be non-decreasing per identity; returns the value
    /// to report when it actually advanced.
    fn bump_percent(&self, identity: &AppIdentity, percent: u8) -> Option<u8> {
        let mut active = self.active.lock().ok()?;
        let entry = active.get_mut(identity)?;
        if percent > entry.percent {
            entry.percent = percent;
            Some(percent)
        } else {
            None
        }
    }

    fn installed_record(
        &self,
        identity: &AppIdentity,
    ) -> Result<Option<InstalledApp>, LifecycleError> {
        Ok(self.store.get(identity)?.and_then(|app| app.installed))
    }

    fn backup_path(&self, identity: &AppIdentity) -> Result<PathBuf, LifecycleError> {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .context("system time is before unix epoch")
            .map_err(LifecycleError::Internal)?
            .as_nanos();
        Ok(self
            .layout
            .apps_dir()
            .join(&identity.source)
            .join(format!(".{}-backup-{nanos}", identity.name)))
    }
}
