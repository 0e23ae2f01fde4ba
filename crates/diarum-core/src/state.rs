//! Observable diary sync state.
//!
//! Every transition replaces the whole [`SyncState`], so subscribers never see
//! a half-updated value.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;

use crate::models::DiaryDate;

pub const SAVING_MESSAGE: &str = "Saving...";
pub const SAVED_MESSAGE: &str = "Saved";
pub const SAVE_FAILED_MESSAGE: &str = "Failed to save";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    #[default]
    Idle,
    Saving,
    Saved,
    Error,
}

/// Snapshot of the sync subsystem, as rendered by a status indicator.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SyncState {
    pub is_syncing: bool,
    /// Date being saved, or the date that failed
    pub current_date: Option<DiaryDate>,
    pub status: SyncStatus,
    pub message: String,
}

impl SyncState {
    #[must_use]
    pub fn idle() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn saving(date: DiaryDate) -> Self {
        Self {
            is_syncing: true,
            current_date: Some(date),
            status: SyncStatus::Saving,
            message: SAVING_MESSAGE.to_string(),
        }
    }

    #[must_use]
    pub fn saved() -> Self {
        Self {
            is_syncing: false,
            current_date: None,
            status: SyncStatus::Saved,
            message: SAVED_MESSAGE.to_string(),
        }
    }

    #[must_use]
    pub fn failed(date: DiaryDate, message: impl Into<String>) -> Self {
        Self {
            is_syncing: false,
            current_date: Some(date),
            status: SyncStatus::Error,
            message: message.into(),
        }
    }
}

/// Broadcasts [`SyncState`] to any number of subscribers.
///
/// Each publish bumps an epoch so delayed follow-ups (the saved -> idle
/// revert) can tell whether they were superseded.
#[derive(Clone, Debug)]
pub struct SyncStatePublisher {
    sender: Arc<watch::Sender<SyncState>>,
    epoch: Arc<AtomicU64>,
}

impl Default for SyncStatePublisher {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncStatePublisher {
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = watch::channel(SyncState::idle());
        Self {
            sender: Arc::new(sender),
            epoch: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Replace the current state and return the epoch of this transition.
    pub fn publish(&self, state: SyncState) -> u64 {
        let mut epoch = 0;
        self.sender.send_modify(|current| {
            epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
            tracing::debug!(status = ?state.status, date = ?state.current_date, "sync state");
            *current = state;
        });
        epoch
    }

    /// Revert a `Saved` state to `Idle` if nothing was published since `epoch`.
    pub fn revert_saved(&self, epoch: u64) -> bool {
        self.sender.send_if_modified(|current| {
            if self.epoch.load(Ordering::SeqCst) != epoch || current.status != SyncStatus::Saved {
                return false;
            }
            self.epoch.fetch_add(1, Ordering::SeqCst);
            *current = SyncState::idle();
            true
        })
    }

    #[must_use]
    pub fn current(&self) -> SyncState {
        self.sender.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SyncState> {
        self.sender.subscribe()
    }
}
