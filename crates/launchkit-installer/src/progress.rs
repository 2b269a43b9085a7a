use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use launchkit_core::AppIdentity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OperationPhase {
    #[default]
    None,
    Installing,
    Upgrading,
    Removing,
}

/// Transient per-identity operation state. Exists only while an operation
/// is active and resets to `None`/`0` on completion or cancellation; never
/// persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InstallationProgress {
    pub phase: OperationPhase,
    pub percent: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationResult<'a> {
    Ok,
    Cancelled,
    Err(&'a str),
}

/// Receives progress and terminal events for lifecycle operations. Download
/// percent is non-decreasing and ends at 100; extraction reports no finer
/// progress.
pub trait ProgressSink: Sync {
    fn progress(&self, _identity: &AppIdentity, _percent: u8) {}
    fn finished(&self, _identity: &AppIdentity, _result: OperationResult<'_>) {}
}

pub struct NullSink;

impl ProgressSink for NullSink {}

/// Cooperative cancellation for an in-flight download. Cancelling aborts
/// the transfer between chunks; partial bytes are discarded and the
/// identity returns to idle with `installed` untouched.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
