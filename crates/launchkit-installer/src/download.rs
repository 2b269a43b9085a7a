use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use launchkit_core::FetchFailure;

use crate::error::LifecycleError;
use crate::progress::CancelToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadStatus {
    Completed,
    Cancelled,
}

/// Streams one artifact to `dest`. The observer is called per chunk with
/// `(bytes_so_far, total_bytes)`; returning `false` aborts the transfer,
/// which the fetcher reports as `Cancelled` after discarding its stream.
/// Implemented over HTTP at the binary edge and in-memory in tests.
pub trait ArtifactFetcher: Sync {
    fn download(
        &self,
        url: &str,
        dest: &Path,
        observer: &mut dyn FnMut(u64, Option<u64>) -> bool,
    ) -> Result<DownloadStatus, FetchFailure>;
}

/// Download to `<cache_path>.part`, then rename into the cache, so an
/// interrupted transfer never leaves a plausible-looking artifact behind.
/// Percent is derived from the byte counts and clamped non-decreasing; 100
/// is emitted exactly once, after the artifact is fully in place.
pub(crate) fn download_to_cache(
    fetcher: &dyn ArtifactFetcher,
    url: &str,
    cache_path: &Path,
    on_percent: &mut dyn FnMut(u8),
    cancel: &CancelToken,
) -> Result<DownloadStatus, LifecycleError> {
    if let Some(parent) = cache_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))
            .map_err(LifecycleError::Internal)?;
    }

    let part_path = part_path_for(cache_path);
    let mut last_percent = 0_u8;
    let mut observer = |bytes: u64, total: Option<u64>| {
        let percent = match total {
            // hold 99 back until the rename below has happened
            Some(total) if total > 0 => (((bytes * 100) / total) as u8).min(99),
            _ => 0,
        };
        if percent > last_percent {
            last_percent = percent;
            on_percent(percent);
        }
        !cancel.is_cancelled()
    };

    let status = match fetcher.download(url, &part_path, &mut observer) {
        Ok(status) => status,
        Err(failure) => {
            let _ = remove_file_if_exists(&part_path);
            return Err(LifecycleError::Fetch(failure));
        }
    };

    match status {
        DownloadStatus::Cancelled => {
            let _ = remove_file_if_exists(&part_path);
            Ok(DownloadStatus::Cancelled)
        }
        DownloadStatus::Completed => {
            fs::rename(&part_path, cache_path)
                .with_context(|| {
                    format!(
                        "failed to move downloaded artifact into cache: {}",
                        cache_path.display()
                    )
                })
                .map_err(|err| {
                    let _ = remove_file_if_exists(&part_path);
                    LifecycleError::Internal(err)
                })?;
            on_percent(100);
            Ok(DownloadStatus::Completed)
        }
    }
}

pub(crate) fn part_path_for(cache_path: &Path) -> PathBuf {
    let mut file_name = cache_path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| "artifact".to_string());
    file_name.push_str(".part");
    cache_path.with_file_name(file_name)
}

pub(crate) fn remove_file_if_exists(path: &Path) -> std::io::Result<()> {
    if path.exists() {
        fs::remove_file(path)?;
    }
    Ok(())
}
