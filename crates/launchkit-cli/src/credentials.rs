use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use launchkit_flow::{ConsentStore, CredentialStore, TokenInformation};
use serde::{Deserialize, Serialize};

/// File-backed store for the restricted-source bearer token. A record that
/// exists but cannot be read or decoded reports `EncryptionUnavailable`
/// instead of failing, so the launcher can offer re-entering the token.
pub(crate) struct FileCredentialStore {
    path: PathBuf,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenRecord {
    token: String,
    set_at_unix: u64,
}

impl FileCredentialStore {
    pub(crate) fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn read_record(&self) -> Result<Option<TokenRecord>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("failed reading token: {}", self.path.display()))
            }
        };

        let record = serde_json::from_str(&raw)
            .with_context(|| format!("failed decoding token: {}", self.path.display()))?;
        Ok(Some(record))
    }
}

impl CredentialStore for FileCredentialStore {
    fn token(&self) -> Result<Option<String>> {
        Ok(self.read_record().ok().flatten().map(|record| record.token))
    }

    fn set_token(&self, value: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }

        let record = TokenRecord {
            token: value.to_string(),
            set_at_unix: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .context("system time is before unix epoch")?
                .as_secs(),
        };
        let encoded =
            serde_json::to_string_pretty(&record).context("failed encoding token record")?;
        fs::write(&self.path, encoded)
            .with_context(|| format!("failed writing token: {}", self.path.display()))?;
        restrict_permissions(&self.path)?;
        Ok(())
    }

    fn information(&self) -> Result<TokenInformation> {
        match self.read_record() {
            Ok(Some(record)) => Ok(TokenInformation::Set {
                set_at_unix: record.set_at_unix,
                preview: token_preview(&record.token),
            }),
            Ok(None) => Ok(TokenInformation::NotSet),
            Err(_) => Ok(TokenInformation::EncryptionUnavailable),
        }
    }
}

fn token_preview(token: &str) -> String {
    let head: String = token.chars().take(4).collect();
    format!("{head}…")
}

#[cfg(unix)]
fn restrict_permissions(path: &std::path::Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
        .with_context(|| format!("failed restricting token permissions: {}", path.display()))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &std::path::Path) -> Result<()> {
    Ok(())
}

/// Telemetry consent flag persisted as a one-word file.
pub(crate) struct FileConsentStore {
    path: PathBuf,
}

impl FileConsentStore {
    pub(crate) fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl ConsentStore for FileConsentStore {
    fn get(&self) -> Result<Option<bool>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("failed reading consent: {}", self.path.display()))
            }
        };

        match raw.trim() {
            "granted" => Ok(Some(true)),
            "denied" => Ok(Some(false)),
            other => anyhow::bail!(
                "invalid consent value '{other}' in {}",
                self.path.display()
            ),
        }
    }

    fn set(&self, granted: bool) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let value = if granted { "granted" } else { "denied" };
        fs::write(&self.path, format!("{value}\n"))
            .with_context(|| format!("failed writing consent: {}", self.path.display()))
    }
}
