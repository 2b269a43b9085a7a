use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use launchkit_catalog::{CatalogSnapshot, ManifestTransport};
use launchkit_core::{AppIdentity, AppInfo, SourceManifest};
use launchkit_flow::{
    displayed_apps, refresh_catalog, remove_source_cascade, run_steps, startup_steps,
    update_steps, CredentialStore, StartupContext, TokenInformation, UpdateContext,
};
use launchkit_installer::{
    default_user_root, CancelToken, InstallationLifecycle, LauncherLayout, NullSink,
};
use launchkit_registry::{
    has_restricted_access_url, AppInfoStore, SchemaMigrator, Source, SourceRegistry, SourceState,
};
use semver::Version;

use crate::config::LauncherConfig;
use crate::credentials::{FileConsentStore, FileCredentialStore};
use crate::http::{HttpClient, HttpUpdateChannel, StoredTokenLookup};
use crate::render::{CliPrompt, OutputStyle, TerminalRenderer};

pub(crate) struct CliEnv {
    pub layout: LauncherLayout,
    pub registry: SourceRegistry,
    pub store: AppInfoStore,
    pub lifecycle: InstallationLifecycle,
    pub config: LauncherConfig,
    pub renderer: TerminalRenderer,
}

pub(crate) fn build_env(root: Option<PathBuf>, plain: bool) -> Result<CliEnv> {
    let root = match root {
        Some(root) => root,
        None => default_user_root()?,
    };
    let layout = LauncherLayout::new(root);
    layout.ensure_base_dirs()?;
    let config = LauncherConfig::load(&layout.config_path())?;
    let style = if plain || config.plain_output {
        OutputStyle::Plain
    } else {
        OutputStyle::Rich
    };
    let renderer = TerminalRenderer::new(style);

    // migrations run before anything else reads persisted state; a failure
    // aborts rather than risking data loss
    let report = SchemaMigrator::new(layout.state_dir())
        .migrate()
        .context("schema migration failed; refusing to start with mixed on-disk state")?;
    if !report.applied.is_empty() {
        renderer.print_status("migrated", &report.applied.join(", "));
    }

    let registry = SourceRegistry::new(layout.state_dir());
    let store = AppInfoStore::new(layout.state_dir());
    let lifecycle = InstallationLifecycle::new(layout.clone(), store.clone());

    Ok(CliEnv {
        layout,
        registry,
        store,
        lifecycle,
        config,
        renderer,
    })
}

pub(crate) fn parse_app_spec(spec: &str) -> Result<(AppIdentity, Option<Version>)> {
    let (identity_part, version) = match spec.split_once('@') {
        Some((identity_part, version)) => {
            let version = Version::parse(version)
                .with_context(|| format!("invalid version in app spec: {version}"))?;
            (identity_part, Some(version))
        }
        None => (spec, None),
    };

    let Some((source, name)) = identity_part.split_once('/') else {
        return Err(anyhow!(
            "app spec must be '<source>/<app>[@version]', got: {spec}"
        ));
    };
    if source.trim().is_empty() || name.trim().is_empty() {
        return Err(anyhow!(
            "app spec must be '<source>/<app>[@version]', got: {spec}"
        ));
    }

    Ok((AppIdentity::new(source, name), version))
}

pub(crate) fn run_sources(env: &CliEnv) -> Result<()> {
    let sources = env.registry.get_all()?;
    env.renderer.print_lines(&source_lines(&sources));

    let deprecated = env.registry.deprecated_sources()?;
    if !deprecated.is_empty() {
        env.renderer.print_warning(&format!(
            "{} source(s) point at retired hosts; remove them with 'launchkit remove-source <name>'",
            deprecated.len()
        ));
    }
    Ok(())
}

pub(crate) fn run_add_source(env: &CliEnv, url: &str, name: Option<String>) -> Result<()> {
    let http = HttpClient::new()?;
    let token = credential_store(env).token()?;
    if has_restricted_access_url(url) && token.is_none() {
        return Err(anyhow!(
            "source at {url} requires an access token; set one with 'launchkit token set <value>'"
        ));
    }

    let text = http
        .fetch_text(url, token.as_deref())
        .map_err(|err| anyhow!(err))
        .with_context(|| format!("failed fetching source manifest: {url}"))?;
    let manifest = SourceManifest::from_json_str(&text)
        .with_context(|| format!("invalid source manifest at {url}"))?;

    let name = name.unwrap_or_else(|| manifest.name.clone());
    let source = env.registry.add(&name, url)?;
    env.renderer.print_status(
        "added",
        &format!("{} ({} app(s) listed)", source.name, manifest.apps.len()),
    );
    Ok(())
}

pub(crate) fn run_remove_source(env: &CliEnv, name: &str) -> Result<()> {
    let removed = remove_source_cascade(&env.registry, &env.store, &env.lifecycle, name, &NullSink)?;
    env.renderer.print_status("removed", &removed.name);
    Ok(())
}

pub(crate) fn run_refresh(env: &CliEnv) -> Result<()> {
    let snapshot = fetch_snapshot(env)?;
    env.renderer.print_lines(&snapshot_summary_lines(&snapshot));
    Ok(())
}

pub(crate) fn run_list(env: &CliEnv) -> Result<()> {
    let snapshot = fetch_snapshot(env)?;
    let apps = displayed_apps(&snapshot, &env.store)?;

    env.renderer.print_lines(&app_lines(&apps));
    env.renderer
        .print_lines(&snapshot_error_lines(&snapshot));
    Ok(())
}

pub(crate) fn run_local(env: &CliEnv) -> Result<()> {
    let apps = env.store.local_apps()?;
    if apps.is_empty() {
        env.renderer.print_status("local", "no apps installed");
        return Ok(());
    }
    env.renderer.print_lines(&app_lines(&apps));
    Ok(())
}

pub(crate) fn run_install(env: &CliEnv, spec: &str) -> Result<()> {
    let (identity, version) = parse_app_spec(spec)?;
    let app = cached_app(env, &identity)?;
    let version = version.unwrap_or_else(|| app.latest_version.clone());

    let http = HttpClient::new()?;
    let sink = env
        .renderer
        .operation_sink(&format!("install {identity}"));
    env.lifecycle
        .install(&app, &version, &http, &sink, &CancelToken::new())?;
    Ok(())
}

pub(crate) fn run_upgrade(env: &CliEnv, spec: &str) -> Result<()> {
    let (identity, version) = parse_app_spec(spec)?;
    let app = cached_app(env, &identity)?;
    let version = version.unwrap_or_else(|| app.latest_version.clone());

    let http = HttpClient::new()?;
    let sink = env
        .renderer
        .operation_sink(&format!("upgrade {identity}"));
    env.lifecycle
        .upgrade(&app, &version, &http, &sink, &CancelToken::new())?;
    Ok(())
}

pub(crate) fn run_remove(env: &CliEnv, spec: &str) -> Result<()> {
    let (identity, version) = parse_app_spec(spec)?;
    if version.is_some() {
        return Err(anyhow!("remove takes no version: {spec}"));
    }

    let sink = env.renderer.operation_sink(&format!("remove {identity}"));
    env.lifecycle.remove(&identity, &sink)?;
    Ok(())
}

pub(crate) fn run_startup(env: &CliEnv, assume_yes: bool) -> Result<()> {
    let consent = FileConsentStore::new(env.layout.consent_path());
    let credentials = credential_store(env);
    let prompt = CliPrompt {
        assume_yes,
        interactive: std::io::stdin().is_terminal(),
    };

    let mut cx = StartupContext::new(
        &env.registry,
        &env.store,
        &env.lifecycle,
        &consent,
        &credentials,
        &prompt,
    );
    let remaining = run_steps(startup_steps(), &mut cx)?;

    if !remaining.is_empty() {
        env.renderer.print_warning(&format!(
            "startup paused awaiting input; pending steps: {}",
            remaining.names().join(", ")
        ));
        return Ok(());
    }

    env.renderer.print_status(
        "ready",
        &format!(
            "{} source(s), {} app(s) installed",
            cx.sources.len(),
            cx.local_apps().len()
        ),
    );
    if cx.token_unavailable {
        env.renderer
            .print_warning("stored access token could not be decoded; set it again");
    }
    if !cx.missing_credential_sources.is_empty() {
        env.renderer.print_warning(&format!(
            "{} restricted source(s) have no access token; run 'launchkit token set <value>'",
            cx.missing_credential_sources.len()
        ));
    }
    if cx.update_checks_requested {
        env.renderer
            .print_status("next", "run 'launchkit update-check' for background update checks");
    }
    Ok(())
}

pub(crate) fn run_update_check(env: &CliEnv, assume_yes: bool) -> Result<()> {
    let http = HttpClient::new()?;
    let channel = HttpUpdateChannel {
        client: &http,
        base_url: env.config.update_channel_url().to_string(),
    };
    let credentials = StoredTokenLookup {
        token: credential_store(env).token()?,
    };
    let prompt = CliPrompt {
        assume_yes,
        interactive: std::io::stdin().is_terminal(),
    };
    let launcher_version =
        Version::parse(env!("CARGO_PKG_VERSION")).context("invalid launcher version")?;

    let mut cx = UpdateContext::new(
        &env.registry,
        &env.store,
        &http,
        &credentials,
        &channel,
        &prompt,
        launcher_version,
        env.config.companion_version(),
    );
    let remaining = run_steps(update_steps(), &mut cx)?;

    if !remaining.is_empty() {
        env.renderer.print_warning(&format!(
            "update check paused awaiting input; pending steps: {}",
            remaining.names().join(", ")
        ));
        return Ok(());
    }

    match (&cx.self_update, cx.self_update_accepted) {
        (Some(version), true) => env
            .renderer
            .print_status("launcher", &format!("update to {version} accepted")),
        (Some(version), false) => env
            .renderer
            .print_status("launcher", &format!("{version} available, skipped")),
        (None, _) => env.renderer.print_status("launcher", "up to date"),
    }
    match (&cx.companion_update, cx.companion_update_accepted) {
        (Some(version), true) => env
            .renderer
            .print_status("device-bridge", &format!("update to {version} accepted")),
        (Some(version), false) => env
            .renderer
            .print_status("device-bridge", &format!("{version} available, skipped")),
        (None, _) => env.renderer.print_status("device-bridge", "up to date"),
    }
    if let Some(snapshot) = &cx.snapshot {
        env.renderer.print_lines(&snapshot_summary_lines(snapshot));
    }
    Ok(())
}

pub(crate) fn run_token_show(env: &CliEnv) -> Result<()> {
    match credential_store(env).information()? {
        TokenInformation::Set {
            set_at_unix,
            preview,
        } => env.renderer.print_status(
            "token",
            &format!("{preview} (set at unix {set_at_unix})"),
        ),
        TokenInformation::NotSet => env.renderer.print_status("token", "not set"),
        TokenInformation::EncryptionUnavailable => env
            .renderer
            .print_warning("token record exists but cannot be decoded; set it again"),
    }
    Ok(())
}

pub(crate) fn run_token_set(env: &CliEnv, value: &str) -> Result<()> {
    credential_store(env).set_token(value)?;
    env.renderer.print_status("token", "stored");
    Ok(())
}

fn credential_store(env: &CliEnv) -> FileCredentialStore {
    FileCredentialStore::new(env.layout.token_path())
}

fn fetch_snapshot(env: &CliEnv) -> Result<CatalogSnapshot> {
    let http = HttpClient::new()?;
    let credentials = StoredTokenLookup {
        token: credential_store(env).token()?,
    };
    refresh_catalog(&env.registry, &env.store, &http, &credentials)
}

fn cached_app(env: &CliEnv, identity: &AppIdentity) -> Result<AppInfo> {
    env.store
        .get(identity)?
        .ok_or_else(|| anyhow!("unknown app '{identity}'; run 'launchkit refresh' first"))
}

pub(crate) fn source_lines(sources: &[Source]) -> Vec<String> {
    sources
        .iter()
        .map(|source| {
            let flag = match source.state {
                SourceState::InUse => "",
                SourceState::Deprecated => " [deprecated]",
                SourceState::RestrictedAccess => " [restricted]",
            };
            if source.url.is_empty() {
                format!("{} (built-in){flag}", source.name)
            } else {
                format!("{} {}{flag}", source.name, source.url)
            }
        })
        .collect()
}

pub(crate) fn app_lines(apps: &[AppInfo]) -> Vec<String> {
    apps.iter()
        .map(|app| {
            let installed = match &app.installed {
                Some(installed) if installed.version < app.latest_version => {
                    format!(" (installed {}, update available)", installed.version)
                }
                Some(installed) => format!(" (installed {})", installed.version),
                None => String::new(),
            };
            format!(
                "{} {} - {}{installed}",
                app.identity, app.latest_version, app.display_name
            )
        })
        .collect()
}

pub(crate) fn snapshot_summary_lines(snapshot: &CatalogSnapshot) -> Vec<String> {
    let mut lines = vec![format!(
        "fetched {} app(s), {} app error(s), {} source error(s)",
        snapshot.apps.len(),
        snapshot.app_errors.len(),
        snapshot.source_errors.len()
    )];
    lines.extend(snapshot_error_lines(snapshot));
    lines
}

pub(crate) fn snapshot_error_lines(snapshot: &CatalogSnapshot) -> Vec<String> {
    let mut lines = Vec::new();
    for error in &snapshot.source_errors {
        lines.push(format!("source '{}': {}", error.source, error.cause));
        if error.cause.is_not_found() {
            lines.push(format!(
                "  the source looks stale; consider 'launchkit remove-source {}'",
                error.source
            ));
        }
    }
    for error in &snapshot.app_errors {
        lines.push(format!("app '{}': {}", error.identity, error.cause));
    }
    lines
}
