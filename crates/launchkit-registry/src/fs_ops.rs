use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::RegistryError;

/// Write the full snapshot to a sibling temp file and rename it into place,
/// so a concurrent reader never observes a partially written file.
pub(crate) fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), RegistryError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|err| RegistryError::io(parent, err))?;
    }

    let tmp_path = sibling_tmp_path(path);
    fs::write(&tmp_path, contents).map_err(|err| RegistryError::io(&tmp_path, err))?;
    if let Err(err) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(RegistryError::io(path, err));
    }

    Ok(())
}

pub(crate) fn read_json_file<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, RegistryError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(RegistryError::io(path, err)),
    };

    let value =
        serde_json::from_str(&raw).map_err(|err| RegistryError::schema(path, err.to_string()))?;
    Ok(Some(value))
}

pub(crate) fn write_json_file<T: Serialize>(path: &Path, value: &T) -> Result<(), RegistryError> {
    let mut encoded = serde_json::to_string_pretty(value)
        .map_err(|err| RegistryError::schema(path, err.to_string()))?;
    encoded.push('\n');
    write_atomic(path, encoded.as_bytes())
}

fn sibling_tmp_path(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| "snapshot".to_string());
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    path.with_file_name(format!(
        ".{file_name}.tmp-{}-{}",
        std::process::id(),
        nanos
    ))
}
