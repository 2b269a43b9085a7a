use anyhow::{Context, Result};
use launchkit_catalog::{fetch_all, merge_installed, CatalogSnapshot, CredentialLookup, ManifestTransport};
use launchkit_core::AppInfo;
use launchkit_installer::{InstallationLifecycle, ProgressSink};
use launchkit_registry::{AppInfoStore, Source, SourceRegistry};

/// Removing a source removes the source record, every app installed from
/// it, and its cached catalog entries, in that order.
pub fn remove_source_cascade(
    registry: &SourceRegistry,
    store: &AppInfoStore,
    lifecycle: &InstallationLifecycle,
    name: &str,
    sink: &dyn ProgressSink,
) -> Result<Source> {
    let removed = registry
        .remove(name)
        .with_context(|| format!("failed removing source '{name}'"))?;
    lifecycle
        .remove_source_apps(name, sink)
        .with_context(|| format!("failed removing apps installed from '{name}'"))?;
    store
        .remove_source_entries(name)
        .with_context(|| format!("failed pruning cached apps of '{name}'"))?;
    Ok(removed)
}

/// One full fetch cycle persisted into the app-info cache. Fetch errors come
/// back inside the snapshot; only a failure to persist is an error here.
pub fn refresh_catalog(
    registry: &SourceRegistry,
    store: &AppInfoStore,
    transport: &dyn ManifestTransport,
    credentials: &dyn CredentialLookup,
) -> Result<CatalogSnapshot> {
    let sources = registry.get_all().context("failed loading sources")?;
    let snapshot = fetch_all(&sources, transport, credentials);
    store
        .upsert_remote(&snapshot.apps)
        .context("failed persisting the app-info snapshot")?;
    Ok(snapshot)
}

/// What the launcher window renders: the fetched catalog overlaid with the
/// locally recorded installs.
pub fn displayed_apps(snapshot: &CatalogSnapshot, store: &AppInfoStore) -> Result<Vec<AppInfo>> {
    let local = store
        .local_apps()
        .context("failed loading locally installed apps")?;
    Ok(merge_installed(snapshot.apps.clone(), &local))
}
