use launchkit_core::AppInfo;

/// Overlay the locally recorded installs onto a freshly fetched catalog.
/// Apps whose source failed this cycle (or that came from the `local`
/// source) still show up, carrying their cached metadata, so an offline
/// launcher keeps rendering what is actually on disk.
pub fn merge_installed(fetched: Vec<AppInfo>, local: &[AppInfo]) -> Vec<AppInfo> {
    let mut merged = fetched;

    for local_app in local {
        let Some(installed) = &local_app.installed else {
            continue;
        };
        match merged
            .iter_mut()
            .find(|app| app.identity == local_app.identity)
        {
            Some(app) => app.installed = Some(installed.clone()),
            None => merged.push(local_app.clone()),
        }
    }

    merged.sort_by(|a, b| a.identity.cmp(&b.identity));
    merged
}
