use launchkit_core::FetchFailure;
use launchkit_registry::Source;

/// Fetches one remote JSON document. Implemented over HTTP at the binary
/// edge and in-memory in tests; the fetch/merge logic never talks to the
/// network directly.
pub trait ManifestTransport: Sync {
    fn fetch_text(&self, url: &str, bearer_token: Option<&str>) -> Result<String, FetchFailure>;
}

/// Looks up the bearer credential for a restricted source. The registry
/// only classifies sources; tokens live in an external credential store.
pub trait CredentialLookup: Sync {
    fn token_for(&self, source: &Source) -> Option<String>;
}

pub struct NoCredentials;

impl CredentialLookup for NoCredentials {
    fn token_for(&self, _source: &Source) -> Option<String> {
        None
    }
}
