use std::fs;
use std::io::{Read, Write};
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use launchkit_catalog::{CredentialLookup, ManifestTransport};
use launchkit_core::FetchFailure;
use launchkit_flow::UpdateChannel;
use launchkit_installer::{ArtifactFetcher, DownloadStatus};
use launchkit_registry::Source;
use semver::Version;
use serde::Deserialize;

const DOWNLOAD_CHUNK_SIZE: usize = 64 * 1024;

pub(crate) struct HttpClient {
    client: reqwest::blocking::Client,
}

impl HttpClient {
    pub(crate) fn new() -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("launchkit/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(30))
            .build()
            .context("failed building the HTTP client")?;
        Ok(Self { client })
    }

    fn get(
        &self,
        url: &str,
        bearer_token: Option<&str>,
    ) -> Result<reqwest::blocking::Response, FetchFailure> {
        let mut request = self.client.get(url);
        if let Some(token) = bearer_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().map_err(|err| FetchFailure::Network {
            url: url.to_string(),
            detail: err.to_string(),
        })?;

        let status = response.status();
        if status.as_u16() == 404 {
            return Err(FetchFailure::NotFound {
                url: url.to_string(),
            });
        }
        if !status.is_success() {
            return Err(FetchFailure::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response)
    }
}

impl ManifestTransport for HttpClient {
    fn fetch_text(&self, url: &str, bearer_token: Option<&str>) -> Result<String, FetchFailure> {
        self.get(url, bearer_token)?
            .text()
            .map_err(|err| FetchFailure::Network {
                url: url.to_string(),
                detail: err.to_string(),
            })
    }
}

impl ArtifactFetcher for HttpClient {
    fn download(
        &self,
        url: &str,
        dest: &Path,
        observer: &mut dyn FnMut(u64, Option<u64>) -> bool,
    ) -> Result<DownloadStatus, FetchFailure> {
        let io_failure = |err: std::io::Error| FetchFailure::Network {
            url: url.to_string(),
            detail: err.to_string(),
        };
        let mut response = self.get(url, None)?;
        let total = response.content_length();

        let mut file = fs::File::create(dest).map_err(io_failure)?;
        let mut buffer = vec![0_u8; DOWNLOAD_CHUNK_SIZE];
        let mut downloaded = 0_u64;
        loop {
            let read = response.read(&mut buffer).map_err(io_failure)?;
            if read == 0 {
                break;
            }
            file.write_all(&buffer[..read]).map_err(io_failure)?;
            downloaded += read as u64;
            if !observer(downloaded, total) {
                return Ok(DownloadStatus::Cancelled);
            }
        }
        file.flush().map_err(io_failure)?;

        Ok(DownloadStatus::Completed)
    }
}

/// Release feed: one `{component}.json` per self-updating component under
/// the update channel URL.
pub(crate) struct HttpUpdateChannel<'a> {
    pub client: &'a HttpClient,
    pub base_url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReleaseDocument {
    latest_version: Version,
}

impl UpdateChannel for HttpUpdateChannel<'_> {
    fn latest(&self, component: &str, current: &Version) -> Result<Option<Version>> {
        let url = format!("{}/{component}.json", self.base_url.trim_end_matches('/'));
        let raw = match self.client.fetch_text(&url, None) {
            Ok(raw) => raw,
            // no release feed for this component is not an update
            Err(FetchFailure::NotFound { .. }) => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        let release: ReleaseDocument = serde_json::from_str(&raw)
            .with_context(|| format!("failed parsing release document: {url}"))?;
        if release.latest_version > *current {
            Ok(Some(release.latest_version))
        } else {
            Ok(None)
        }
    }
}

/// Catalog fetches use the stored token for every restricted source; the
/// launcher keeps a single credential, not one per source.
pub(crate) struct StoredTokenLookup {
    pub token: Option<String>,
}

impl CredentialLookup for StoredTokenLookup {
    fn token_for(&self, _source: &Source) -> Option<String> {
        self.token.clone()
    }
}
