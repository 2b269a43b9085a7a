use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use launchkit_core::{AppIdentity, AppInfo, InstalledApp};
use semver::Version;

use super::*;

static TEST_STATE_ROOT_COUNTER: AtomicU64 = AtomicU64::new(0);

fn test_state_dir() -> PathBuf {
    let mut path = std::env::temp_dir();
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time")
        .as_nanos();
    let counter = TEST_STATE_ROOT_COUNTER.fetch_add(1, Ordering::SeqCst);
    path.push(format!(
        "launchkit-registry-tests-{}-{}-{}",
        std::process::id(),
        nanos,
        counter
    ));
    path
}

fn app_info(source: &str, name: &str, latest: &str) -> AppInfo {
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

#[test]
fn registry_starts_with_builtin_sources() {
    let dir = test_state_dir();
    let registry = SourceRegistry::new(&dir);

    let sources = registry.get_all().expect("must list sources");
    let names: Vec<&str> = sources.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["official", "local"]);
    assert_eq!(sources[0].url, OFFICIAL_SOURCE_URL);
    assert!(!sources[1].is_fetchable());

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn add_source_persists_and_classifies_state() {
    let dir = test_state_dir();
    let registry = SourceRegistry::new(&dir);

    let added = registry
        .add("community", "https://community.example.net/source.json")
        .expect("must add source");
    assert_eq!(added.state, SourceState::InUse);

    let restricted = registry
        .add("internal", "https://artifacts.launchkit.dev/internal/source.json")
        .expect("must add restricted source");
    assert_eq!(restricted.state, SourceState::RestrictedAccess);

    let names: Vec<String> = registry
        .custom_sources()
        .expect("must list customs")
        .into_iter()
        .map(|s| s.name)
        .collect();
    assert_eq!(names, vec!["community", "internal"]);

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn add_source_rejects_duplicate_name() {
    let dir = test_state_dir();
    let registry = SourceRegistry::new(&dir);

    registry
        .add("community", "https://a.example.net/source.json")
        .expect("must add source");
    let err = registry
        .add("community", "https://b.example.net/source.json")
        .expect_err("must reject duplicate");
    assert!(matches!(err, RegistryError::DuplicateName(name) if name == "community"));

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn builtin_sources_cannot_be_added_or_removed() {
    let dir = test_state_dir();
    let registry = SourceRegistry::new(&dir);

    let err = registry
        .add("official", "https://elsewhere.example.net/source.json")
        .expect_err("must reject built-in add");
    assert!(matches!(err, RegistryError::BuiltInSource(_)));

    let err = registry.remove("local").expect_err("must reject built-in remove");
    assert!(matches!(err, RegistryError::BuiltInSource(_)));

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn remove_source_returns_removed_record() {
    let dir = test_state_dir();
    let registry = SourceRegistry::new(&dir);

    registry
        .add("community", "https://community.example.net/source.json")
        .expect("must add source");
    let removed = registry.remove("community").expect("must remove source");
    assert_eq!(removed.name, "community");

    let err = registry.remove("community").expect_err("must be gone");
    assert!(matches!(err, RegistryError::SourceNotFound(_)));

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn invalid_source_names_are_rejected() {
    let dir = test_state_dir();
    let registry = SourceRegistry::new(&dir);

    let too_long_name = "a".repeat(65);
    for name in ["", "Bad Name", "-leading", too_long_name.as_str()] {
        let err = registry
            .add(name, "https://x.example.net/source.json")
            .expect_err("must reject invalid name");
        assert!(matches!(err, RegistryError::InvalidName(_)), "name: {name:?}");
    }

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn v2_is_authoritative_over_v1() {
    let dir = test_state_dir();
    fs::create_dir_all(&dir).expect("must create state dir");
    fs::write(
        dir.join("sources-versioned.json"),
        r#"{
            "v1": [{ "name": "old", "url": "https://downloads.launchkit.io/apps/old/source.json" }],
            "v2": [{ "name": "new", "url": "https://apps.launchkit.dev/new/source.json", "state": "in-use" }]
        }"#,
    )
    .expect("must write sources file");

    let registry = SourceRegistry::new(&dir);
    let customs = registry.custom_sources().expect("must list customs");
    assert_eq!(customs.len(), 1);
    assert_eq!(customs[0].name, "new");

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn malformed_sources_file_is_a_schema_error() {
    let dir = test_state_dir();
    fs::create_dir_all(&dir).expect("must create state dir");
    fs::write(dir.join("sources-versioned.json"), "{ not json").expect("must write file");

    let registry = SourceRegistry::new(&dir);
    let err = registry.get_all().expect_err("must surface schema error");
    assert!(matches!(err, RegistryError::Schema { .. }));

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn deprecated_sources_are_flagged_not_removed() {
    let dir = test_state_dir();
    let registry = SourceRegistry::new(&dir);

    registry
        .add("stale", "https://downloads.launchkit.io/apps/stale/source.json")
        .expect("must add deprecated source");
    registry
        .add("fresh", "https://apps.launchkit.dev/fresh/source.json")
        .expect("must add fresh source");

    let deprecated = registry.deprecated_sources().expect("must classify");
    assert_eq!(deprecated.len(), 1);
    assert_eq!(deprecated[0].name, "stale");
    assert_eq!(registry.custom_sources().expect("still two").len(), 2);

    let removed = registry.remove_deprecated().expect("opt-in bulk removal");
    assert_eq!(removed.len(), 1);
    let names: Vec<String> = registry
        .custom_sources()
        .expect("must list customs")
        .into_iter()
        .map(|s| s.name)
        .collect();
    assert_eq!(names, vec!["fresh"]);

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn restricted_access_classification() {
    assert!(has_restricted_access_url(
        "https://artifacts.launchkit.dev/team/source.json"
    ));
    assert!(has_restricted_access_url("https://builds.corp.internal/source.json"));
    assert!(!has_restricted_access_url("https://apps.launchkit.dev/source.json"));
}

#[test]
fn url_rewrite_is_deterministic_and_targeted() {
    let legacy = "https://downloads.launchkit.io/apps/tools/source.json";
    let rewritten = rewrite_source_url(legacy);
    assert_eq!(rewritten, "https://apps.launchkit.dev/tools/source.json");
    assert_eq!(rewrite_source_url(legacy), rewritten);

    assert_eq!(
        rewrite_source_url("https://cdn.launchkit.io/things/source.json"),
        "https://apps.launchkit.dev/things/source.json"
    );
    assert_eq!(
        rewrite_source_url("https://apps.launchkit.dev/tools/source.json"),
        "https://apps.launchkit.dev/tools/source.json"
    );
    assert_eq!(
        rewrite_source_url("https://community.example.net/source.json"),
        "https://community.example.net/source.json"
    );
}

#[test]
fn no_temp_files_survive_a_save() {
    let dir = test_state_dir();
    let registry = SourceRegistry::new(&dir);
    registry
        .add("community", "https://community.example.net/source.json")
        .expect("must add source");

    let leftovers: Vec<_> = fs::read_dir(&dir)
        .expect("must read state dir")
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().to_string())
        .filter(|name| name.contains(".tmp-"))
        .collect();
    assert!(leftovers.is_empty(), "leftover temp files: {leftovers:?}");

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn app_info_store_records_and_clears_installs() {
    let dir = test_state_dir();
    let store = AppInfoStore::new(&dir);

    let app = app_info("official", "terminal", "2.1.0");
    store
        .record_install(
            &app,
            InstalledApp {
                path: "/tmp/apps/official/terminal".to_string(),
                version: Version::new(2, 1, 0),
                publish_timestamp: Some(1_753_000_000),
            },
        )
        .expect("must record install");

    let local = store.local_apps().expect("must list local apps");
    assert_eq!(local.len(), 1);
    assert_eq!(
        local[0].installed.as_ref().expect("installed").version,
        Version::new(2, 1, 0)
    );

    store
        .clear_installed(&app.identity)
        .expect("must clear install");
    assert!(store.local_apps().expect("must list").is_empty());

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn upsert_remote_preserves_installed_state() {
    let dir = test_state_dir();
    let store = AppInfoStore::new(&dir);

    let app = app_info("official", "terminal", "1.0.0");
    store
        .record_install(
            &app,
            InstalledApp {
                path: "/tmp/apps/official/terminal".to_string(),
                version: Version::new(1, 0, 0),
                publish_timestamp: None,
            },
        )
        .expect("must record install");

    let refreshed = app_info("official", "terminal", "2.0.0");
    store
        .upsert_remote(&[refreshed])
        .expect("must refresh remote fields");

    let stored = store
        .get(&AppIdentity::new("official", "terminal"))
        .expect("must read store")
        .expect("entry must exist");
    assert_eq!(stored.latest_version, Version::new(2, 0, 0));
    assert_eq!(
        stored.installed.expect("installed state must survive").version,
        Version::new(1, 0, 0)
    );

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn upsert_remote_keeps_entries_from_unfetched_sources() {
    let dir = test_state_dir();
    let store = AppInfoStore::new(&dir);

    store
        .upsert_remote(&[app_info("community", "editor", "1.0.0")])
        .expect("must seed cache");
    store
        .upsert_remote(&[app_info("official", "terminal", "1.0.0")])
        .expect("must refresh other source");

    let file = store.load().expect("must load cache");
    assert_eq!(file.apps.len(), 2);

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn remove_source_entries_drops_only_that_source() {
    let dir = test_state_dir();
    let store = AppInfoStore::new(&dir);

    store
        .upsert_remote(&[
            app_info("community", "editor", "1.0.0"),
            app_info("community", "terminal", "1.0.0"),
            app_info("official", "terminal", "1.0.0"),
        ])
        .expect("must seed cache");

    let dropped = store
        .remove_source_entries("community")
        .expect("must drop source entries");
    assert_eq!(dropped.len(), 2);

    let file = store.load().expect("must load cache");
    assert_eq!(file.apps.len(), 1);
    assert_eq!(file.apps[0].identity.source, "official");

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn migrate_legacy_sources_into_versioned_envelope() {
    let dir = test_state_dir();
    fs::create_dir_all(&dir).expect("must create state dir");
    fs::write(
        dir.join("sources.json"),
        r#"{
            "community": "https://community.example.net/source.json",
            "official": "https://apps.launchkit.dev/official/source.json"
        }"#,
    )
    .expect("must write legacy sources");

    let report = SchemaMigrator::new(&dir).migrate().expect("must migrate");
    assert_eq!(report.applied, vec!["sources-v1", "sources-v2"]);

    let file: SourcesFile = serde_json::from_str(
        &fs::read_to_string(dir.join("sources-versioned.json")).expect("must read envelope"),
    )
    .expect("must parse envelope");

    // built-ins are never persisted as custom entries
    let v1 = file.v1.expect("v1 must exist");
    assert_eq!(v1.len(), 1);
    assert_eq!(v1[0].name, "community");
    let v2 = file.v2.expect("v2 must exist");
    assert_eq!(v2.len(), 1);
    assert_eq!(v2[0].state, SourceState::InUse);

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn migrate_v1_only_envelope_adds_rewritten_v2() {
    let dir = test_state_dir();
    fs::create_dir_all(&dir).expect("must create state dir");
    let original = r#"{
  "v1": [
    { "name": "tools", "url": "https://downloads.launchkit.io/apps/tools/source.json" }
  ]
}"#;
    fs::write(dir.join("sources-versioned.json"), original).expect("must write envelope");

    let report = SchemaMigrator::new(&dir).migrate().expect("must migrate");
    assert_eq!(report.applied, vec!["sources-v2"]);

    let file: SourcesFile = serde_json::from_str(
        &fs::read_to_string(dir.join("sources-versioned.json")).expect("must read envelope"),
    )
    .expect("must parse envelope");

    let v1 = file.v1.expect("v1 must be retained");
    assert_eq!(
        v1[0].url,
        "https://downloads.launchkit.io/apps/tools/source.json"
    );
    let v2 = file.v2.expect("v2 must be derived");
    assert_eq!(v2[0].url, "https://apps.launchkit.dev/tools/source.json");
    assert_eq!(v2[0].state, SourceState::InUse);

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn migrate_twice_is_idempotent() {
    let dir = test_state_dir();
    fs::create_dir_all(&dir).expect("must create state dir");
    fs::write(
        dir.join("sources.json"),
        r#"{ "tools": "https://downloads.launchkit.io/apps/tools/source.json" }"#,
    )
    .expect("must write legacy sources");
    fs::write(
        dir.join("apps-available.json"),
        r#"{
            "terminal": {
                "displayName": "Terminal",
                "description": "Serial terminal",
                "iconUrl": "https://apps.launchkit.dev/terminal/icon.svg",
                "releaseNotesUrl": "https://apps.launchkit.dev/terminal/Changelog.md",
                "currentVersion": "1.2.0",
                "path": "/tmp/apps/official/terminal"
            },
            "note": "catalog assembled by the 1.x launcher"
        }"#,
    )
    .expect("must write legacy apps");

    let migrator = SchemaMigrator::new(&dir);
    let first = migrator.migrate().expect("first run must migrate");
    assert_eq!(first.applied, vec!["sources-v1", "sources-v2", "app-info-fold"]);

    let sources_after_first =
        fs::read_to_string(dir.join("sources-versioned.json")).expect("must read envelope");
    let apps_after_first =
        fs::read_to_string(dir.join("app-info.json")).expect("must read app info");

    let second = migrator.migrate().expect("second run must be a no-op");
    assert!(second.applied.is_empty());
    assert_eq!(
        fs::read_to_string(dir.join("sources-versioned.json")).expect("must read envelope"),
        sources_after_first
    );
    assert_eq!(
        fs::read_to_string(dir.join("app-info.json")).expect("must read app info"),
        apps_after_first
    );

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn fold_legacy_app_metadata_into_app_info() {
    let dir = test_state_dir();
    fs::create_dir_all(dir.join("manifests")).expect("must create manifests dir");
    fs::write(
        dir.join("apps-available.json"),
        r#"{
            "terminal": {
                "displayName": "Terminal",
                "description": "Serial terminal",
                "iconUrl": "https://apps.launchkit.dev/terminal/icon.svg",
                "releaseNotesUrl": "https://apps.launchkit.dev/terminal/Changelog.md",
                "currentVersion": "1.2.0",
                "path": "/tmp/apps/official/terminal"
            },
            "profiler": {
                "displayName": "Profiler",
                "description": "Power profiler",
                "iconUrl": "https://apps.launchkit.dev/profiler/icon.svg",
                "releaseNotesUrl": "https://apps.launchkit.dev/profiler/Changelog.md"
            },
            "note": "catalog assembled by the 1.x launcher"
        }"#,
    )
    .expect("must write legacy apps");
    fs::write(
        dir.join("apps-updates.json"),
        r#"{ "terminal": "2.0.0" }"#,
    )
    .expect("must write legacy updates");
    fs::write(
        dir.join("manifests").join("profiler.json"),
        r#"{
            "versions": {
                "0.9.0": { "tarballUrl": "https://apps.launchkit.dev/profiler-0.9.0.tar.gz" },
                "1.0.0": { "tarballUrl": "https://apps.launchkit.dev/profiler-1.0.0.tar.gz" }
            }
        }"#,
    )
    .expect("must write legacy manifest");

    let report = SchemaMigrator::new(&dir).migrate().expect("must migrate");
    assert_eq!(report.applied, vec!["app-info-fold"]);

    let store = AppInfoStore::new(&dir);
    let file = store.load().expect("must load folded file");
    assert_eq!(file.apps.len(), 2, "the note entry is dropped");

    let terminal = store
        .get(&AppIdentity::new("official", "terminal"))
        .expect("must read store")
        .expect("terminal must exist");
    assert_eq!(terminal.latest_version, Version::new(2, 0, 0));
    let installed = terminal.installed.expect("installed app keeps its path");
    assert_eq!(installed.path, "/tmp/apps/official/terminal");
    assert_eq!(installed.version, Version::new(1, 2, 0));

    let profiler = store
        .get(&AppIdentity::new("official", "profiler"))
        .expect("must read store")
        .expect("profiler must exist");
    assert!(profiler.installed.is_none(), "never-installed app stays uninstalled");
    assert_eq!(profiler.latest_version, Version::new(1, 0, 0));
    assert_eq!(profiler.versions.len(), 2);

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn fold_without_any_version_information_aborts() {
    let dir = test_state_dir();
    fs::create_dir_all(&dir).expect("must create state dir");
    fs::write(
        dir.join("apps-available.json"),
        r#"{ "mystery": { "displayName": "Mystery", "description": "" } }"#,
    )
    .expect("must write legacy apps");

    let err = SchemaMigrator::new(&dir)
        .migrate()
        .expect_err("must abort on unmappable legacy data");
    assert!(format!("{err:#}").contains("no version information"));
    assert!(!dir.join("app-info.json").exists(), "nothing may be partially applied");

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn malformed_legacy_sources_abort_migration() {
    let dir = test_state_dir();
    fs::create_dir_all(&dir).expect("must create state dir");
    fs::write(dir.join("sources.json"), "{ not json").expect("must write file");

    let err = SchemaMigrator::new(&dir)
        .migrate()
        .expect_err("must abort on malformed legacy file");
    assert!(format!("{err:#}").contains("sources.json"));
    assert!(!dir.join("sources-versioned.json").exists());

    let _ = fs::remove_dir_all(&dir);
}
