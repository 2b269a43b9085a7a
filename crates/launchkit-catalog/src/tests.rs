use std::collections::BTreeMap;
use std::sync::Mutex;

use launchkit_core::{AppIdentity, AppInfo, FetchFailure, InstalledApp};
use launchkit_registry::{Source, SourceState};
use semver::Version;

use super::*;

#[derive(Default)]
struct InMemoryTransport {
    responses: BTreeMap<String, Result<String, FetchFailure>>,
    expected_token: Option<String>,
    requests: Mutex<Vec<String>>,
}

impl InMemoryTransport {
    fn with_response(mut self, url: &str, body: &str) -> Self {
        self.responses
            .insert(url.to_string(), Ok(body.to_string()));
        self
    }

    fn with_failure(mut self, url: &str, failure: FetchFailure) -> Self {
        self.responses.insert(url.to_string(), Err(failure));
        self
    }

    fn expecting_token(mut self, token: &str) -> Self {
        self.expected_token = Some(token.to_string());
        self
    }

    fn requested_urls(&self) -> Vec<String> {
        self.requests.lock().expect("requests lock").clone()
    }
}

impl ManifestTransport for InMemoryTransport {
    fn fetch_text(&self, url: &str, bearer_token: Option<&str>) -> Result<String, FetchFailure> {
        self.requests
            .lock()
            .expect("requests lock")
            .push(url.to_string());

        if let Some(expected) = &self.expected_token {
            assert_eq!(
                bearer_token,
                Some(expected.as_str()),
                "restricted fetch must carry the bearer token"
            );
        }

        match self.responses.get(url) {
            Some(result) => result.clone(),
            None => Err(FetchFailure::NotFound {
                url: url.to_string(),
            }),
        }
    }
}

struct FixedToken(&'static str);

impl CredentialLookup for FixedToken {
    fn token_for(&self, _source: &Source) -> Option<String> {
        Some(self.0.to_string())
    }
}

fn source(name: &str, url: &str) -> Source {
    Source {
        name: name.to_string(),
        url: url.to_string(),
        state: SourceState::InUse,
    }
}

fn manifest_json(name: &str, apps: &[&str]) -> String {
    let urls: Vec<String> = apps.iter().map(|url| format!("\"{url}\"")).collect();
    format!("{{ \"name\": \"{name}\", \"apps\": [{}] }}", urls.join(", "))
}

fn descriptor_json(name: &str, latest: &str) -> String {
    format!(
        r#"{{
            "name": "{name}",
            "displayName": "{name}",
            "description": "test app",
            "iconUrl": "https://apps.test/{name}/icon.svg",
            "releaseNotesUrl": "https://apps.test/{name}/Changelog.md",
            "latestVersion": "{latest}",
            "versions": {{
                "{latest}": {{ "tarballUrl": "https://apps.test/{name}-{latest}.tar.gz" }}
            }}
        }}"#
    )
}

#[test]
fn one_failing_source_does_not_abort_the_others() {
    let transport = InMemoryTransport::default()
        .with_response("https://ok.test/source.json", &manifest_json("ok", &["https://ok.test/tool/app.json"]))
        .with_response("https://ok.test/tool/app.json", &descriptor_json("tool", "1.0.0"))
        .with_failure(
            "https://broken.test/source.json",
            FetchFailure::HttpStatus {
                url: "https://broken.test/source.json".to_string(),
                status: 500,
            },
        );

    let sources = [
        source("ok", "https://ok.test/source.json"),
        source("broken", "https://broken.test/source.json"),
    ];
    let snapshot = fetch_all(&sources, &transport, &NoCredentials);

    assert_eq!(snapshot.apps.len(), 1);
    assert_eq!(snapshot.apps[0].identity, AppIdentity::new("ok", "tool"));
    assert!(snapshot.app_errors.is_empty());
    assert_eq!(snapshot.source_errors.len(), 1);
    assert_eq!(snapshot.source_errors[0].source, "broken");
    assert!(matches!(
        snapshot.source_errors[0].cause,
        FetchFailure::HttpStatus { status: 500, .. }
    ));
}

#[test]
fn app_timeout_is_isolated_from_sibling_apps() {
    // official lists [a, b]; a's descriptor fetch times out.
    let transport = InMemoryTransport::default()
        .with_response(
            "https://official.test/source.json",
            &manifest_json(
                "official",
                &[
                    "https://official.test/a/app.json",
                    "https://official.test/b/app.json",
                ],
            ),
        )
        .with_failure(
            "https://official.test/a/app.json",
            FetchFailure::Network {
                url: "https://official.test/a/app.json".to_string(),
                detail: "connection timed out".to_string(),
            },
        )
        .with_response("https://official.test/b/app.json", &descriptor_json("b", "1.0.0"));

    let sources = [source("official", "https://official.test/source.json")];
    let snapshot = fetch_all(&sources, &transport, &NoCredentials);

    assert_eq!(snapshot.apps.len(), 1);
    assert_eq!(snapshot.apps[0].identity, AppIdentity::new("official", "b"));
    assert!(snapshot.source_errors.is_empty());
    assert_eq!(snapshot.app_errors.len(), 1);
    assert_eq!(
        snapshot.app_errors[0].identity,
        AppIdentity::new("official", "a")
    );
    assert!(matches!(
        &snapshot.app_errors[0].cause,
        FetchFailure::Network { detail, .. } if detail == "connection timed out"
    ));
}

#[test]
fn same_app_name_from_two_sources_stays_distinct() {
    let transport = InMemoryTransport::default()
        .with_response("https://one.test/source.json", &manifest_json("one", &["https://one.test/foo.json"]))
        .with_response("https://one.test/foo.json", &descriptor_json("foo", "1.0.0"))
        .with_response("https://two.test/source.json", &manifest_json("two", &["https://two.test/foo.json"]))
        .with_response("https://two.test/foo.json", &descriptor_json("foo", "2.0.0"));

    let sources = [
        source("one", "https://one.test/source.json"),
        source("two", "https://two.test/source.json"),
    ];
    let snapshot = fetch_all(&sources, &transport, &NoCredentials);

    assert_eq!(snapshot.apps.len(), 2);
    let identities: Vec<String> = snapshot
        .apps
        .iter()
        .map(|app| app.identity.to_string())
        .collect();
    assert_eq!(identities, vec!["one/foo", "two/foo"]);
}

#[test]
fn duplicate_identity_within_one_cycle_resolves_to_later_result() {
    let transport = InMemoryTransport::default()
        .with_response(
            "https://one.test/source.json",
            &manifest_json(
                "one",
                &["https://one.test/foo-old.json", "https://one.test/foo-new.json"],
            ),
        )
        .with_response("https://one.test/foo-old.json", &descriptor_json("foo", "1.0.0"))
        .with_response("https://one.test/foo-new.json", &descriptor_json("foo", "2.0.0"));

    let sources = [source("one", "https://one.test/source.json")];
    let snapshot = fetch_all(&sources, &transport, &NoCredentials);

    assert_eq!(snapshot.apps.len(), 1);
    assert_eq!(snapshot.apps[0].latest_version, Version::new(2, 0, 0));
}

#[test]
fn missing_source_manifest_reports_not_found_with_url() {
    let transport = InMemoryTransport::default();
    let sources = [source("stale", "https://stale.test/source.json")];

    let snapshot = fetch_all(&sources, &transport, &NoCredentials);

    assert!(snapshot.apps.is_empty());
    assert_eq!(snapshot.source_errors.len(), 1);
    assert!(snapshot.source_errors[0].cause.is_not_found());
    assert!(matches!(
        &snapshot.source_errors[0].cause,
        FetchFailure::NotFound { url } if url == "https://stale.test/source.json"
    ));
}

#[test]
fn malformed_descriptor_is_a_schema_error_for_that_app_only() {
    let transport = InMemoryTransport::default()
        .with_response(
            "https://one.test/source.json",
            &manifest_json("one", &["https://one.test/bad/app.json", "https://one.test/good.json"]),
        )
        .with_response("https://one.test/bad/app.json", "{ definitely not json")
        .with_response("https://one.test/good.json", &descriptor_json("good", "1.0.0"));

    let sources = [source("one", "https://one.test/source.json")];
    let snapshot = fetch_all(&sources, &transport, &NoCredentials);

    assert_eq!(snapshot.apps.len(), 1);
    assert_eq!(snapshot.app_errors.len(), 1);
    assert_eq!(snapshot.app_errors[0].identity, AppIdentity::new("one", "bad"));
    assert!(matches!(
        &snapshot.app_errors[0].cause,
        FetchFailure::Schema { url, .. } if url == "https://one.test/bad/app.json"
    ));
}

#[test]
fn restricted_source_without_token_is_not_fetched() {
    let transport = InMemoryTransport::default();
    let mut restricted = source("corp", "https://artifacts.launchkit.dev/corp/source.json");
    restricted.state = SourceState::RestrictedAccess;

    let snapshot = fetch_all(&[restricted], &transport, &NoCredentials);

    assert_eq!(snapshot.source_errors.len(), 1);
    assert_eq!(snapshot.source_errors[0].cause, FetchFailure::MissingCredential);
    assert!(
        transport.requested_urls().is_empty(),
        "no request may be issued without a credential"
    );
}

#[test]
fn restricted_source_with_token_fetches_with_bearer() {
    let transport = InMemoryTransport::default()
        .expecting_token("secret-token")
        .with_response(
            "https://artifacts.launchkit.dev/corp/source.json",
            &manifest_json("corp", &["https://artifacts.launchkit.dev/corp/tool.json"]),
        )
        .with_response(
            "https://artifacts.launchkit.dev/corp/tool.json",
            &descriptor_json("tool", "1.0.0"),
        );

    let mut restricted = source("corp", "https://artifacts.launchkit.dev/corp/source.json");
    restricted.state = SourceState::RestrictedAccess;

    let snapshot = fetch_all(&[restricted], &transport, &FixedToken("secret-token"));

    assert_eq!(snapshot.apps.len(), 1);
    assert!(snapshot.source_errors.is_empty());
}

#[test]
fn local_source_is_skipped_by_the_fetcher() {
    let transport = InMemoryTransport::default();
    let local = Source {
        name: "local".to_string(),
        url: String::new(),
        state: SourceState::InUse,
    };

    let snapshot = fetch_all(&[local], &transport, &NoCredentials);
    assert!(snapshot.apps.is_empty());
    assert!(snapshot.source_errors.is_empty());
    assert!(transport.requested_urls().is_empty());
}

#[test]
fn merge_installed_overlays_and_keeps_offline_installs() {
    let fetched = vec![remote_app("official", "terminal", "2.0.0")];

    let mut cached_terminal = remote_app("official", "terminal", "1.0.0");
    cached_terminal.installed = Some(installed_at("/tmp/apps/official/terminal", "1.0.0"));
    let mut offline_editor = remote_app("community", "editor", "3.0.0");
    offline_editor.installed = Some(installed_at("/tmp/apps/community/editor", "3.0.0"));
    let never_installed = remote_app("official", "profiler", "1.0.0");

    let merged = merge_installed(
        fetched,
        &[cached_terminal, offline_editor, never_installed],
    );

    assert_eq!(merged.len(), 2);
    assert_eq!(merged[0].identity.to_string(), "community/editor");
    assert_eq!(merged[1].identity.to_string(), "official/terminal");
    // fresh remote metadata wins, installed state survives
    assert_eq!(merged[1].latest_version, Version::new(2, 0, 0));
    assert_eq!(
        merged[1].installed.as_ref().expect("installed").version,
        Version::new(1, 0, 0)
    );
}

fn remote_app(source: &str, name: &str, latest: &str) -> AppInfo {
    AppInfo {
        identity: AppIdentity::new(source, name),
        display_name: name.to_string(),
        description: String::new(),
        homepage: None,
        icon_url: String::new(),
        release_notes_url: String::new(),
        latest_version: Version::parse(latest).expect("valid version"),
        versions: Default::default(),
        installed: None,
    }
}

fn installed_at(path: &str, version: &str) -> InstalledApp {
    InstalledApp {
        path: path.to_string(),
        version: Version::parse(version).expect("valid version"),
        publish_timestamp: None,
    }
}
