use std::collections::BTreeMap;
use std::thread;

use launchkit_core::{AppDescriptor, AppIdentity, AppInfo, FetchFailure, SourceManifest};
use launchkit_registry::{has_restricted_access_url, Source, SourceState};

use crate::transport::{CredentialLookup, ManifestTransport};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFetchError {
    pub source: String,
    pub cause: FetchFailure,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppFetchError {
    pub identity: AppIdentity,
    pub cause: FetchFailure,
}

/// The outcome of one full fetch cycle: every app that could be resolved,
/// plus the errors that were isolated along the way. Nothing in here is
/// thrown; partial success is the normal shape.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogSnapshot {
    pub apps: Vec<AppInfo>,
    pub app_errors: Vec<AppFetchError>,
    pub source_errors: Vec<SourceFetchError>,
}

struct SourceOutcome {
    apps: Vec<AppInfo>,
    app_errors: Vec<AppFetchError>,
    source_error: Option<SourceFetchError>,
}

/// Fetch every source's manifest concurrently, then every listed app's
/// descriptor concurrently within its source. A slow or failing source
/// never blocks or aborts the others; failures come back as data.
pub fn fetch_all(
    sources: &[Source],
    transport: &dyn ManifestTransport,
    credentials: &dyn CredentialLookup,
) -> CatalogSnapshot {
    let fetchable: Vec<&Source> = sources.iter().filter(|source| source.is_fetchable()).collect();

    let outcomes: Vec<SourceOutcome> = thread::scope(|scope| {
        let handles: Vec<_> = fetchable
            .iter()
            .map(|&source| scope.spawn(move || fetch_source(source, transport, credentials)))
            .collect();

        handles
            .into_iter()
            .zip(&fetchable)
            .map(|(handle, source)| {
                handle.join().unwrap_or_else(|_| SourceOutcome {
                    apps: Vec::new(),
                    app_errors: Vec::new(),
                    source_error: Some(SourceFetchError {
                        source: source.name.clone(),
                        cause: FetchFailure::Network {
                            url: source.url.clone(),
                            detail: "source fetch task panicked".to_string(),
                        },
                    }),
                })
            })
            .collect()
    });

    let mut merged: BTreeMap<AppIdentity, AppInfo> = BTreeMap::new();
    let mut snapshot = CatalogSnapshot::default();
    for outcome in outcomes {
        // keyed by (source, name): the same identity appearing twice in one
        // cycle resolves to the later result; same-named apps from different
        // sources stay distinct.
        for app in outcome.apps {
            merged.insert(app.identity.clone(), app);
        }
        snapshot.app_errors.extend(outcome.app_errors);
        snapshot.source_errors.extend(outcome.source_error);
    }
    snapshot.apps = merged.into_values().collect();
    snapshot
}

fn fetch_source(
    source: &Source,
    transport: &dyn ManifestTransport,
    credentials: &dyn CredentialLookup,
) -> SourceOutcome {
    let source_failure = |cause: FetchFailure| SourceOutcome {
        apps: Vec::new(),
        app_errors: Vec::new(),
        source_error: Some(SourceFetchError {
            source: source.name.clone(),
            cause,
        }),
    };

    let restricted = source.state == SourceState::RestrictedAccess
        || has_restricted_access_url(&source.url);
    let token = if restricted {
        match credentials.token_for(source) {
            Some(token) => Some(token),
            None => return source_failure(FetchFailure::MissingCredential),
        }
    } else {
        None
    };

    let manifest_text = match transport.fetch_text(&source.url, token.as_deref()) {
        Ok(text) => text,
        Err(cause) => return source_failure(cause),
    };
    let manifest = match SourceManifest::from_json_str(&manifest_text) {
        Ok(manifest) => manifest,
        Err(err) => {
            return source_failure(FetchFailure::Schema {
                url: source.url.clone(),
                detail: format!("{err:#}"),
            })
        }
    };

    fetch_source_apps(source, &manifest, transport, token.as_deref())
}

fn fetch_source_apps(
    source: &Source,
    manifest: &SourceManifest,
    transport: &dyn ManifestTransport,
    token: Option<&str>,
) -> SourceOutcome {
    let results: Vec<Result<AppInfo, AppFetchError>> = thread::scope(|scope| {
        let handles: Vec<_> = manifest
            .apps
            .iter()
            .map(|url| scope.spawn(move || fetch_app(source, url, transport, token)))
            .collect();

        handles
            .into_iter()
            .zip(&manifest.apps)
            .map(|(handle, url)| {
                handle.join().unwrap_or_else(|_| {
                    Err(AppFetchError {
                        identity: AppIdentity::new(&source.name, app_name_hint(url)),
                        cause: FetchFailure::Network {
                            url: url.clone(),
                            detail: "app fetch task panicked".to_string(),
                        },
                    })
                })
            })
            .collect()
    });

    let mut outcome = SourceOutcome {
        apps: Vec::new(),
        app_errors: Vec::new(),
        source_error: None,
    };
    for result in results {
        match result {
            Ok(app) => outcome.apps.push(app),
            Err(error) => outcome.app_errors.push(error),
        }
    }
    outcome
}

fn fetch_app(
    source: &Source,
    url: &str,
    transport: &dyn ManifestTransport,
    token: Option<&str>,
) -> Result<AppInfo, AppFetchError> {
    let failure = |cause: FetchFailure| AppFetchError {
        identity: AppIdentity::new(&source.name, app_name_hint(url)),
        cause,
    };

    let text = transport.fetch_text(url, token).map_err(failure)?;
    let descriptor = AppDescriptor::from_json_str(&text).map_err(|err| {
        failure(FetchFailure::Schema {
            url: url.to_string(),
            detail: format!("{err:#}"),
        })
    })?;

    Ok(AppInfo::from_descriptor(&source.name, descriptor))
}

/// Best-effort app name for error reporting when the descriptor itself could
/// not be fetched or parsed. Descriptor URLs end either in `<name>.json` or
/// in `<name>/app.json`.
fn app_name_hint(url: &str) -> String {
    let without_fragment = url.split(['?', '#']).next().unwrap_or(url);
    let mut segments = without_fragment
        .trim_end_matches('/')
        .rsplit('/')
        .filter(|segment| !segment.is_empty());

    let last = segments.next().unwrap_or("unknown");
    let stem = last.strip_suffix(".json").unwrap_or(last);
    if stem == "app" || stem == "descriptor" {
        return segments.next().unwrap_or("unknown").to_string();
    }
    stem.to_string()
}
