use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use launchkit_core::{AppIdentity, AppInfo, InstalledApp, VersionArtifact};
use semver::Version;
use serde::Deserialize;

use crate::app_info_store::{AppInfoFile, APP_INFO_SCHEMA_VERSION};
use crate::fs_ops::{read_json_file, write_json_file};
use crate::source_types::{
    classify_source_state, is_builtin_source_name, rewrite_source_url, validate_source_name,
    Source, SourceRecordV1, SourcesFile,
};
use crate::OFFICIAL_SOURCE;

/// The key legacy metadata used for its free-form provenance note. It is
/// dropped during the fold, not migrated.
const LEGACY_NOTE_KEY: &str = "note";

#[derive(Debug, Default, PartialEq, Eq)]
pub struct MigrationReport {
    pub applied: Vec<&'static str>,
}

/// Brings the on-disk metadata under `state/` up to the current schema.
/// Runs once at startup before anything else reads persisted state; a
/// failure aborts startup, since silently continuing risks data loss.
///
/// Every step is skipped when its target already exists or its legacy input
/// is absent, so calling `migrate` on every launch is safe and running it
/// twice produces a byte-identical result.
#[derive(Debug, Clone)]
pub struct SchemaMigrator {
    state_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyAvailableEntry {
    #[serde(default)]
    display_name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    homepage: Option<String>,
    #[serde(default)]
    icon_url: String,
    #[serde(default)]
    release_notes_url: String,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    current_version: Option<Version>,
    #[serde(default)]
    path: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct LegacyAppManifest {
    #[serde(default)]
    versions: BTreeMap<Version, VersionArtifact>,
}

impl SchemaMigrator {
    pub fn new(state_dir: impl Into<PathBuf>) -> Self {
        Self {
            state_dir: state_dir.into(),
        }
    }

    pub fn migrate(&self) -> Result<MigrationReport> {
        let mut report = MigrationReport::default();

        if self.migrate_legacy_sources()? {
            report.applied.push("sources-v1");
        }
        if self.upgrade_sources_to_v2()? {
            report.applied.push("sources-v2");
        }
        if self.fold_legacy_app_metadata()? {
            report.applied.push("app-info-fold");
        }

        Ok(report)
    }

    fn sources_versioned_path(&self) -> PathBuf {
        self.state_dir.join("sources-versioned.json")
    }

    fn legacy_sources_path(&self) -> PathBuf {
        self.state_dir.join("sources.json")
    }

    fn app_info_path(&self) -> PathBuf {
        self.state_dir.join("app-info.json")
    }

    /// Legacy `sources.json` (flat `{name: url}` object) becomes the `v1`
    /// list of the versioned envelope.
    fn migrate_legacy_sources(&self) -> Result<bool> {
        let target = self.sources_versioned_path();
        if target.exists() {
            return Ok(false);
        }
        let legacy_path = self.legacy_sources_path();
        let Some(legacy) = read_json_file::<BTreeMap<String, String>>(&legacy_path)
            .with_context(|| format!("failed migrating {}", legacy_path.display()))?
        else {
            return Ok(false);
        };

        let v1 = fold_legacy_sources(legacy);
        for record in &v1 {
            validate_source_name(&record.name)
                .with_context(|| format!("legacy source list in {}", legacy_path.display()))?;
        }

        let file = SourcesFile {
            v1: Some(v1),
            v2: None,
        };
        write_json_file(&target, &file)
            .with_context(|| format!("failed writing {}", target.display()))?;
        Ok(true)
    }

    /// Derives `v2` from `v1` by rewriting retired download-host URLs and
    /// classifying each source's state. `v1` stays untouched in the file.
    fn upgrade_sources_to_v2(&self) -> Result<bool> {
        let path = self.sources_versioned_path();
        let Some(mut file) = read_json_file::<SourcesFile>(&path)
            .with_context(|| format!("failed migrating {}", path.display()))?
        else {
            return Ok(false);
        };
        if file.v2.is_some() {
            return Ok(false);
        }
        let Some(v1) = file.v1.as_ref() else {
            return Ok(false);
        };

        let v2: Vec<Source> = v1.iter().map(upgrade_source_record).collect();
        validate_unique_names(v2.iter().map(|source| source.name.as_str()))
            .with_context(|| format!("computed v2 source list for {}", path.display()))?;

        file.v2 = Some(v2);
        write_json_file(&path, &file)
            .with_context(|| format!("failed writing {}", path.display()))?;
        Ok(true)
    }

    /// Folds the legacy flat-file app metadata (`apps-available.json`,
    /// `apps-updates.json`, per-app `manifests/<name>.json`) into the single
    /// per-app `app-info.json` descriptor file.
    fn fold_legacy_app_metadata(&self) -> Result<bool> {
        let target = self.app_info_path();
        if target.exists() {
            return Ok(false);
        }
        let available_path = self.state_dir.join("apps-available.json");
        let Some(available) = read_json_file::<BTreeMap<String, serde_json::Value>>(
            &available_path,
        )
        .with_context(|| format!("failed migrating {}", available_path.display()))?
        else {
            return Ok(false);
        };

        let updates_path = self.state_dir.join("apps-updates.json");
        let updates = read_json_file::<BTreeMap<String, Version>>(&updates_path)
            .with_context(|| format!("failed migrating {}", updates_path.display()))?
            .unwrap_or_default();

        let mut apps = Vec::new();
        for (name, value) in available {
            if name == LEGACY_NOTE_KEY {
                continue;
            }

            let entry: LegacyAvailableEntry = serde_json::from_value(value).with_context(|| {
                format!(
                    "invalid legacy entry '{name}' in {}",
                    available_path.display()
                )
            })?;
            let manifest = self.read_legacy_manifest(&name)?;
            let app = fold_legacy_app(&name, entry, updates.get(&name), manifest)
                .with_context(|| format!("failed folding legacy app '{name}'"))?;
            apps.push(app);
        }

        let file = AppInfoFile {
            version: APP_INFO_SCHEMA_VERSION,
            apps,
        };
        validate_unique_identities(&file)?;
        write_json_file(&target, &file)
            .with_context(|| format!("failed writing {}", target.display()))?;
        Ok(true)
    }

    fn read_legacy_manifest(&self, name: &str) -> Result<LegacyAppManifest> {
        let path = self.state_dir.join("manifests").join(format!("{name}.json"));
        Ok(read_json_file::<LegacyAppManifest>(&path)
            .with_context(|| format!("failed migrating {}", path.display()))?
            .unwrap_or_default())
    }
}

fn fold_legacy_sources(legacy: BTreeMap<String, String>) -> Vec<SourceRecordV1> {
    legacy
        .into_iter()
        .filter(|(name, _)| !is_builtin_source_name(name))
        .map(|(name, url)| SourceRecordV1 { name, url })
        .collect()
}

fn upgrade_source_record(record: &SourceRecordV1) -> Source {
    let url = rewrite_source_url(&record.url);
    Source {
        name: record.name.clone(),
        state: classify_source_state(&url),
        url,
    }
}

fn fold_legacy_app(
    name: &str,
    entry: LegacyAvailableEntry,
    update: Option<&Version>,
    manifest: LegacyAppManifest,
) -> Result<AppInfo> {
    let source = entry
        .source
        .clone()
        .unwrap_or_else(|| OFFICIAL_SOURCE.to_string());

    let latest_version = update
        .cloned()
        .or_else(|| manifest.versions.keys().max().cloned())
        .or_else(|| entry.current_version.clone())
        .ok_or_else(|| anyhow!("no version information for legacy app '{name}'"))?;

    let installed = match entry.path {
        Some(path) => {
            let version = entry
                .current_version
                .clone()
                .unwrap_or_else(|| latest_version.clone());
            Some(InstalledApp {
                path,
                version,
                publish_timestamp: None,
            })
        }
        None => None,
    };

    Ok(AppInfo {
        identity: AppIdentity::new(source, name),
        display_name: entry.display_name,
        description: entry.description,
        homepage: entry.homepage,
        icon_url: entry.icon_url,
        release_notes_url: entry.release_notes_url,
        latest_version,
        versions: manifest.versions,
        installed,
    })
}

fn validate_unique_names<'a>(names: impl Iterator<Item = &'a str>) -> Result<()> {
    let mut seen = std::collections::BTreeSet::new();
    for name in names {
        if !seen.insert(name) {
            return Err(anyhow!("duplicate source name '{name}'"));
        }
    }
    Ok(())
}

fn validate_unique_identities(file: &AppInfoFile) -> Result<()> {
    let mut seen = std::collections::BTreeSet::new();
    for app in &file.apps {
        if !seen.insert(app.identity.clone()) {
            return Err(anyhow!("duplicate app identity '{}'", app.identity));
        }
    }
    Ok(())
}
