use std::path::PathBuf;

use crate::fs_ops::{read_json_file, write_json_file};
use crate::source_types::{
    builtin_sources, classify_source_state, has_restricted_access_url, is_builtin_source_name,
    is_deprecated_url, sort_sources, validate_source_name, Source, SourcesFile,
};
use crate::RegistryError;

/// CRUD over the persisted source list. Two built-in sources (`official`,
/// `local`) always exist, are never persisted as custom entries, and cannot
/// be added or removed.
#[derive(Debug, Clone)]
pub struct SourceRegistry {
    state_dir: PathBuf,
}

impl SourceRegistry {
    pub fn new(state_dir: impl Into<PathBuf>) -> Self {
        Self {
            state_dir: state_dir.into(),
        }
    }

    pub fn sources_file_path(&self) -> PathBuf {
        self.state_dir.join("sources-versioned.json")
    }

    pub fn load(&self) -> Result<SourcesFile, RegistryError> {
        Ok(read_json_file(&self.sources_file_path())?.unwrap_or_default())
    }

    pub fn save(&self, file: &SourcesFile) -> Result<(), RegistryError> {
        let mut file = file.clone();
        if let Some(sources) = file.v2.as_mut() {
            sort_sources(sources);
        }
        write_json_file(&self.sources_file_path(), &file)
    }

    /// Built-ins first, then the custom sources. `v2` is authoritative when
    /// present; a registry that was never migrated past `v1` is still
    /// readable, with states derived from each record's URL.
    pub fn get_all(&self) -> Result<Vec<Source>, RegistryError> {
        let file = self.load()?;
        let mut sources = builtin_sources();

        let customs = match (file.v2, file.v1) {
            (Some(v2), _) => v2,
            (None, Some(v1)) => v1
                .into_iter()
                .map(|record| Source {
                    state: classify_source_state(&record.url),
                    name: record.name,
                    url: record.url,
                })
                .collect(),
            (None, None) => Vec::new(),
        };

        sources.extend(
            customs
                .into_iter()
                .filter(|source| !is_builtin_source_name(&source.name)),
        );
        Ok(sources)
    }

    pub fn custom_sources(&self) -> Result<Vec<Source>, RegistryError> {
        Ok(self
            .get_all()?
            .into_iter()
            .filter(|source| !is_builtin_source_name(&source.name))
            .collect())
    }

    pub fn add(&self, name: &str, url: &str) -> Result<Source, RegistryError> {
        validate_source_name(name)?;
        if is_builtin_source_name(name) {
            return Err(RegistryError::BuiltInSource(name.to_string()));
        }

        let mut file = self.load()?;
        let customs = file.v2.get_or_insert_with(Vec::new);
        if customs.iter().any(|existing| existing.name == name) {
            return Err(RegistryError::DuplicateName(name.to_string()));
        }

        let source = Source {
            name: name.to_string(),
            url: url.to_string(),
            state: classify_source_state(url),
        };
        customs.push(source.clone());
        self.save(&file)?;
        Ok(source)
    }

    /// Returns the removed source so the caller can cascade removal of the
    /// apps installed from it.
    pub fn remove(&self, name: &str) -> Result<Source, RegistryError> {
        if is_builtin_source_name(name) {
            return Err(RegistryError::BuiltInSource(name.to_string()));
        }

        let mut file = self.load()?;
        let customs = file.v2.get_or_insert_with(Vec::new);
        let position = customs
            .iter()
            .position(|source| source.name == name)
            .ok_or_else(|| RegistryError::SourceNotFound(name.to_string()))?;
        let removed = customs.remove(position);
        self.save(&file)?;
        Ok(removed)
    }

    pub fn is_deprecated(&self, source: &Source) -> bool {
        is_deprecated_url(&source.url)
    }

    pub fn has_restricted_access(&self, source: &Source) -> bool {
        has_restricted_access_url(&source.url)
    }

    /// Deprecated sources are surfaced for an opt-in bulk removal, never
    /// removed automatically.
    pub fn deprecated_sources(&self) -> Result<Vec<Source>, RegistryError> {
        Ok(self
            .custom_sources()?
            .into_iter()
            .filter(|source| self.is_deprecated(source))
            .collect())
    }

    pub fn remove_deprecated(&self) -> Result<Vec<Source>, RegistryError> {
        let deprecated = self.deprecated_sources()?;
        for source in &deprecated {
            self.remove(&source.name)?;
        }
        Ok(deprecated)
    }
}
