//! Per-login diary session: cache, scheduler and sync state wired together.

use std::sync::{Arc, Mutex};

use tokio::sync::watch;

use super::cache::{CacheEntry, DiaryCache, DirtyEntry};
use super::gateway::DiaryGateway;
use crate::config::SyncConfig;
use crate::error::{Error, Result};
use crate::models::{Diary, DiaryDate};
use crate::state::{SyncState, SyncStatePublisher};
use crate::sync::{lock_cache, SharedCache, SyncScheduler};

/// Entry point for editors: reads and writes go through the cache, saving
/// happens in the background.
///
/// Saves never return an error to the caller; failures surface through the
/// published [`SyncState`].
pub struct DiarySession {
    cache: SharedCache,
    gateway: Arc<dyn DiaryGateway>,
    publisher: SyncStatePublisher,
    scheduler: SyncScheduler,
}

impl DiarySession {
    pub fn new(gateway: Arc<dyn DiaryGateway>, config: SyncConfig) -> Self {
        let cache: SharedCache = Arc::new(Mutex::new(DiaryCache::new()));
        let publisher = SyncStatePublisher::new();
        let scheduler = SyncScheduler::new(
            Arc::clone(&cache),
            Arc::clone(&gateway),
            publisher.clone(),
            config,
        );
        Self {
            cache,
            gateway,
            publisher,
            scheduler,
        }
    }

    pub fn get(&self, date: DiaryDate) -> Option<CacheEntry> {
        lock_cache(&self.cache).get(date).cloned()
    }

    /// Record an edit and (re)arm the debounced flush.
    pub fn update_local(&self, date: DiaryDate, content: impl Into<String>) {
        lock_cache(&self.cache).update_local(date, content);
        self.scheduler.schedule();
    }

    /// Apply a server read; dropped when the date has unsaved edits.
    pub fn update_from_server(
        &self,
        date: DiaryDate,
        content: Option<&str>,
        server_updated_at: Option<&str>,
    ) -> bool {
        lock_cache(&self.cache).update_from_server(date, content, server_updated_at)
    }

    /// [`update_from_server`](Self::update_from_server) for a fetched record.
    pub fn apply_server_diary(&self, date: DiaryDate, diary: Option<&Diary>) -> bool {
        self.update_from_server(
            date,
            diary.map(|diary| diary.content.as_str()),
            diary.and_then(Diary::updated_at),
        )
    }

    /// Fetch `date` from the backend, merge it into the cache and return
    /// what should be displayed.
    ///
    /// A record breaking the mood/weather limits is rejected and leaves the
    /// cache untouched.
    pub async fn refresh_from_server(&self, date: DiaryDate) -> Result<String> {
        let diary = self.gateway.fetch_diary(date).await?;
        if let Some(diary) = &diary {
            diary
                .validate()
                .map_err(|reason| Error::InvalidDiary { date, reason })?;
        }
        if !self.apply_server_diary(date, diary.as_ref()) {
            tracing::debug!(%date, "Kept local edits over fetched diary");
        }
        Ok(self.display_content(date))
    }

    pub fn display_content(&self, date: DiaryDate) -> String {
        lock_cache(&self.cache).display_content(date)
    }

    pub fn has_dirty(&self, date: DiaryDate) -> bool {
        lock_cache(&self.cache).has_dirty(date)
    }

    pub fn list_dirty(&self) -> Vec<DirtyEntry> {
        lock_cache(&self.cache).list_dirty()
    }

    pub fn clear(&self, date: DiaryDate) {
        lock_cache(&self.cache).clear(date);
    }

    pub fn clear_all(&self) {
        lock_cache(&self.cache).clear_all();
    }

    /// Save everything now; resolves once the flush finished.
    pub async fn force_sync_now(&self) -> bool {
        self.scheduler.force_sync_now().await
    }

    pub fn sync_state(&self) -> SyncState {
        self.publisher.current()
    }

    pub fn subscribe(&self) -> watch::Receiver<SyncState> {
        self.publisher.subscribe()
    }

    /// Tear down on logout: cancel timers, drop every entry, go idle.
    ///
    /// Unsaved edits are discarded; call [`force_sync_now`](Self::force_sync_now)
    /// first to keep them. A save already in flight finishes without
    /// publishing, so the state stays idle.
    pub fn reset(&self) {
        self.scheduler.shutdown();
        let discarded = {
            let mut cache = lock_cache(&self.cache);
            let dirty = cache.list_dirty().len();
            cache.clear_all();
            dirty
        };
        if discarded > 0 {
            tracing::warn!(discarded, "Reset diary session with unsaved entries");
        }
        self.publisher.publish(SyncState::idle());
    }
}
