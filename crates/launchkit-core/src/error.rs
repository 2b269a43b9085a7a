use thiserror::Error;

/// Why a single remote fetch failed. Fetch failures are collected per
/// source/per app and returned alongside partial success, never thrown
/// across sibling fetches.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchFailure {
    #[error("network error fetching {url}: {detail}")]
    Network { url: String, detail: String },
    #[error("unexpected HTTP status {status} fetching {url}")]
    HttpStatus { url: String, status: u16 },
    #[error("resource not found: {url}")]
    NotFound { url: String },
    #[error("schema validation failed for {url}: {detail}")]
    Schema { url: String, detail: String },
    #[error("restricted source requires a credential token")]
    MissingCredential,
}

impl FetchFailure {
    /// True for the stale-source shape: the remote endpoint itself is gone,
    /// so offering to remove the source is a sensible remediation.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
