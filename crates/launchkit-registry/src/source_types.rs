use serde::{Deserialize, Serialize};

pub const OFFICIAL_SOURCE: &str = "official";
pub const LOCAL_SOURCE: &str = "local";
pub const OFFICIAL_SOURCE_URL: &str = "https://apps.launchkit.dev/official/source.json";

/// Manifest hosts that have been retired. Sources still pointing at them
/// keep working until the host disappears, but are flagged for opt-in
/// removal rather than being dropped automatically.
const RETIRED_HOSTS: &[&str] = &["downloads.launchkit.io", "cdn.launchkit.io"];

/// Hosts that only answer authenticated requests.
const RESTRICTED_HOSTS: &[&str] = &["artifacts.launchkit.dev"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceState {
    InUse,
    Deprecated,
    RestrictedAccess,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub name: String,
    pub url: String,
    pub state: SourceState,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRecordV1 {
    pub name: String,
    pub url: String,
}

/// Versioned envelope persisted at `state/sources-versioned.json`. Once `v2`
/// exists it is authoritative; `v1` is kept verbatim for rollback and
/// debugging and is never rewritten.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourcesFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub v1: Option<Vec<SourceRecordV1>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub v2: Option<Vec<Source>>,
}

impl Source {
    /// The `local` built-in has no remote manifest to fetch.
    pub fn is_fetchable(&self) -> bool {
        self.name != LOCAL_SOURCE
    }
}

pub fn is_builtin_source_name(name: &str) -> bool {
    name == OFFICIAL_SOURCE || name == LOCAL_SOURCE
}

pub fn builtin_sources() -> Vec<Source> {
    vec![
        Source {
            name: OFFICIAL_SOURCE.to_string(),
            url: OFFICIAL_SOURCE_URL.to_string(),
            state: SourceState::InUse,
        },
        Source {
            name: LOCAL_SOURCE.to_string(),
            url: String::new(),
            state: SourceState::InUse,
        },
    ]
}

pub fn is_deprecated_url(url: &str) -> bool {
    url_host(url)
        .map(|host| RETIRED_HOSTS.contains(&host))
        .unwrap_or(false)
}

pub fn has_restricted_access_url(url: &str) -> bool {
    url_host(url)
        .map(|host| RESTRICTED_HOSTS.contains(&host) || host.ends_with(".internal"))
        .unwrap_or(false)
}

pub fn classify_source_state(url: &str) -> SourceState {
    if is_deprecated_url(url) {
        SourceState::Deprecated
    } else if has_restricted_access_url(url) {
        SourceState::RestrictedAccess
    } else {
        SourceState::InUse
    }
}

/// Deterministic rewrite applied when migrating v1 source records: the
/// retired download hosts moved to `apps.launchkit.dev`, and the old hosts
/// served sources under an `/apps` path prefix that the new host dropped.
/// The same legacy URL always rewrites to the same new URL.
pub fn rewrite_source_url(url: &str) -> String {
    for scheme in ["https://", "http://"] {
        let Some(rest) = url.strip_prefix(scheme) else {
            continue;
        };
        let (host, path) = match rest.split_once('/') {
            Some((host, path)) => (host, format!("/{path}")),
            None => (rest, String::new()),
        };
        if !RETIRED_HOSTS.contains(&host) {
            return url.to_string();
        }

        let path = path.strip_prefix("/apps").unwrap_or(&path);
        return format!("https://apps.launchkit.dev{path}");
    }

    url.to_string()
}

fn url_host(url: &str) -> Option<&str> {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))?;
    let host_port = rest.split(['/', '?', '#']).next()?;
    let host = host_port.split(':').next()?;
    if host.is_empty() {
        None
    } else {
        Some(host)
    }
}

pub(crate) fn validate_source_name(name: &str) -> Result<(), crate::RegistryError> {
    let valid_length = !name.is_empty() && name.len() <= 64;
    let mut chars = name.chars();
    let first_is_valid = chars
        .next()
        .map(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit())
        .unwrap_or(false);
    let rest_is_valid =
        chars.all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '-' || ch == '_');

    if valid_length && first_is_valid && rest_is_valid {
        Ok(())
    } else {
        Err(crate::RegistryError::InvalidName(name.to_string()))
    }
}

pub(crate) fn sort_sources(sources: &mut [Source]) {
    sources.sort_by(|a, b| a.name.cmp(&b.name));
}
