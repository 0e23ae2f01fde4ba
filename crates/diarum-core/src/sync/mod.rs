//! Debounced, single-flight flushing of dirty diary entries.
//!
//! Edits re-arm one pending timer; when it fires, the sync loop saves every
//! dirty entry in order and stops at the first failure. At most one loop runs
//! at a time. A timer that fires mid-loop queues one follow-up run instead of
//! starting a second loop.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{SecondsFormat, Utc};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::config::SyncConfig;
use crate::diary::{DiaryCache, DiaryGateway};
use crate::state::{SyncState, SyncStatePublisher, SAVE_FAILED_MESSAGE};

pub(crate) type SharedCache = Arc<Mutex<DiaryCache>>;

pub(crate) fn lock_cache(cache: &SharedCache) -> MutexGuard<'_, DiaryCache> {
    cache.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Clone)]
pub struct SyncScheduler {
    inner: Arc<SchedulerInner>,
}

struct SchedulerInner {
    cache: SharedCache,
    gateway: Arc<dyn DiaryGateway>,
    publisher: SyncStatePublisher,
    config: SyncConfig,
    debounce_timer: Mutex<Option<JoinHandle<()>>>,
    saved_reset: Mutex<Option<JoinHandle<()>>>,
    flight: tokio::sync::Mutex<()>,
    follow_up: AtomicBool,
    /// Bumped by `shutdown`; loops started earlier stop publishing.
    generation: AtomicU64,
}

impl SyncScheduler {
    pub(crate) fn new(
        cache: SharedCache,
        gateway: Arc<dyn DiaryGateway>,
        publisher: SyncStatePublisher,
        config: SyncConfig,
    ) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                cache,
                gateway,
                publisher,
                config,
                debounce_timer: Mutex::new(None),
                saved_reset: Mutex::new(None),
                flight: tokio::sync::Mutex::new(()),
                follow_up: AtomicBool::new(false),
                generation: AtomicU64::new(0),
            }),
        }
    }

    /// Cancel any pending flush and arm a new one after the debounce window.
    ///
    /// Outside a tokio runtime nothing is armed; entries stay dirty until
    /// [`force_sync_now`](Self::force_sync_now) runs.
    pub fn schedule(&self) {
        let Ok(runtime) = Handle::try_current() else {
            tracing::warn!("No async runtime available; diary flush not scheduled");
            return;
        };

        let inner = Arc::clone(&self.inner);
        let debounce = self.inner.config.debounce;
        let mut timer = lock(&self.inner.debounce_timer);
        if let Some(previous) = timer.take() {
            previous.abort();
        }
        *timer = Some(runtime.spawn(async move {
            tokio::time::sleep(debounce).await;
            // Run detached so a later edit can only cancel the wait, never a save.
            tokio::spawn(inner.run_debounced());
        }));
    }

    /// Flush immediately and report whether every dirty entry was saved.
    pub async fn force_sync_now(&self) -> bool {
        self.cancel_pending();

        let inner = &self.inner;
        let guard = inner.flight.lock().await;
        inner.follow_up.store(false, Ordering::SeqCst);
        let synced = inner.sync_loop().await;
        drop(guard);

        if inner.follow_up.swap(false, Ordering::SeqCst) {
            tokio::spawn(Arc::clone(inner).run_debounced());
        }
        synced
    }

    /// Drop the pending debounce timer, if any.
    pub fn cancel_pending(&self) {
        if let Some(timer) = lock(&self.inner.debounce_timer).take() {
            timer.abort();
        }
    }

    pub fn has_pending(&self) -> bool {
        lock(&self.inner.debounce_timer)
            .as_ref()
            .is_some_and(|timer| !timer.is_finished())
    }

    /// Cancel all timers. A save already in flight still completes, but its
    /// loop no longer publishes sync state.
    pub fn shutdown(&self) {
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        self.cancel_pending();
        if let Some(reset) = lock(&self.inner.saved_reset).take() {
            reset.abort();
        }
        self.inner.follow_up.store(false, Ordering::SeqCst);
    }
}

impl SchedulerInner {
    async fn run_debounced(self: Arc<Self>) {
        // Publish the request before contending so a loop that is just
        // releasing the lock still sees it.
        self.follow_up.store(true, Ordering::SeqCst);
        loop {
            let Ok(guard) = self.flight.try_lock() else {
                tracing::debug!("Sync already running; queued a follow-up flush");
                return;
            };
            if !self.follow_up.swap(false, Ordering::SeqCst) {
                return;
            }
            self.sync_loop().await;
            drop(guard);

            if !self.follow_up.load(Ordering::SeqCst) {
                return;
            }
        }
    }

    async fn sync_loop(&self) -> bool {
        let generation = self.generation.load(Ordering::SeqCst);
        let dirty = lock_cache(&self.cache).list_dirty();
        let Some(first) = dirty.first() else {
            self.publish(generation, SyncState::idle());
            return true;
        };

        self.publish(generation, SyncState::saving(first.date));
        tracing::debug!(count = dirty.len(), "Flushing dirty diary entries");

        for entry in dirty {
            match self.gateway.save_diary(entry.date, &entry.content).await {
                Ok(true) => {
                    let server_updated_at = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
                    let clean = lock_cache(&self.cache).mark_synced(
                        entry.date,
                        entry.revision,
                        server_updated_at,
                    );
                    if !clean {
                        tracing::debug!(date = %entry.date, "Diary changed while saving; kept dirty");
                    }
                }
                Ok(false) => {
                    tracing::warn!(date = %entry.date, "Backend declined diary save");
                    self.publish(generation, SyncState::failed(entry.date, SAVE_FAILED_MESSAGE));
                    return false;
                }
                Err(error) => {
                    tracing::error!("Failed to sync diary for {}: {}", entry.date, error);
                    self.publish(generation, SyncState::failed(entry.date, SAVE_FAILED_MESSAGE));
                    return false;
                }
            }
        }

        if let Some(epoch) = self.publish(generation, SyncState::saved()) {
            self.schedule_saved_reset(epoch);
        }
        true
    }

    /// Publish unless the scheduler was shut down since `generation`.
    fn publish(&self, generation: u64, state: SyncState) -> Option<u64> {
        if self.generation.load(Ordering::SeqCst) != generation {
            tracing::debug!(status = ?state.status, "Dropped sync state from a loop started before shutdown");
            return None;
        }
        Some(self.publisher.publish(state))
    }

    fn schedule_saved_reset(&self, epoch: u64) {
        let publisher = self.publisher.clone();
        let delay = self.config.saved_display;
        let mut reset = lock(&self.saved_reset);
        if let Some(previous) = reset.take() {
            previous.abort();
        }
        *reset = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            publisher.revert_saved(epoch);
        }));
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::time::Duration;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::diary::testing::{Outcome, RecordingGateway};
    use crate::models::DiaryDate;
    use crate::state::SyncStatus;

    const DEBOUNCE: Duration = Duration::from_millis(3000);
    const SAVED_DISPLAY: Duration = Duration::from_millis(2000);

    struct Harness {
        cache: SharedCache,
        gateway: Arc<RecordingGateway>,
        publisher: SyncStatePublisher,
        scheduler: SyncScheduler,
    }

    fn harness(gateway: RecordingGateway) -> Harness {
        let cache: SharedCache = Arc::new(Mutex::new(DiaryCache::new()));
        let gateway = Arc::new(gateway);
        let publisher = SyncStatePublisher::new();
        let scheduler = SyncScheduler::new(
            Arc::clone(&cache),
            gateway.clone(),
            publisher.clone(),
            SyncConfig {
                debounce: DEBOUNCE,
                saved_display: SAVED_DISPLAY,
            },
        );
        Harness {
            cache,
            gateway,
            publisher,
            scheduler,
        }
    }

    impl Harness {
        fn edit(&self, date: DiaryDate, content: &str) -> u64 {
            let revision = lock_cache(&self.cache).update_local(date, content);
            self.scheduler.schedule();
            revision
        }

        fn dirty(&self, date: DiaryDate) -> bool {
            lock_cache(&self.cache).has_dirty(date)
        }
    }

    fn date(raw: &str) -> DiaryDate {
        raw.parse().unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn timer_flush_saves_then_reverts_to_idle() {
        let h = harness(RecordingGateway::new());
        let (d1, d2) = (date("2024-01-01"), date("2024-01-02"));
        h.edit(d1, "one");
        h.edit(d2, "two");

        tokio::time::sleep(DEBOUNCE + Duration::from_millis(10)).await;
        assert_eq!(
            h.gateway.saved_dates(),
            [d1, d2].into_iter().collect::<HashSet<_>>()
        );
        assert!(!h.dirty(d1));
        assert!(!h.dirty(d2));
        assert_eq!(h.publisher.current(), SyncState::saved());

        tokio::time::sleep(SAVED_DISPLAY).await;
        assert_eq!(h.publisher.current(), SyncState::idle());
    }

    #[tokio::test(start_paused = true)]
    async fn bursts_of_edits_coalesce_into_one_save() {
        let h = harness(RecordingGateway::new());
        let day = date("2024-01-01");
        for content in ["h", "he", "hel", "hell", "hello"] {
            h.edit(day, content);
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
        assert!(h.gateway.saves().is_empty());
        assert!(h.scheduler.has_pending());

        tokio::time::sleep(DEBOUNCE).await;
        assert_eq!(h.gateway.saves(), vec![(day, "hello".to_string())]);
        assert!(!h.scheduler.has_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn failure_aborts_remaining_entries() {
        let h = harness(RecordingGateway::new());
        let (d1, d2) = (date("2024-01-01"), date("2024-01-02"));
        h.gateway.fail(d1, Outcome::Error);
        h.edit(d1, "one");
        h.edit(d2, "two");

        assert!(!h.scheduler.force_sync_now().await);
        assert_eq!(h.gateway.saves(), vec![(d1, "one".to_string())]);
        assert!(h.dirty(d1));
        assert!(h.dirty(d2));

        let state = h.publisher.current();
        assert_eq!(state.status, SyncStatus::Error);
        assert_eq!(state.current_date, Some(d1));
        assert_eq!(state.message, SAVE_FAILED_MESSAGE);
        assert!(!state.is_syncing);
    }

    #[tokio::test(start_paused = true)]
    async fn declined_save_is_a_failure() {
        let h = harness(RecordingGateway::new());
        let day = date("2024-01-01");
        h.gateway.fail(day, Outcome::Rejected);
        h.edit(day, "x");

        assert!(!h.scheduler.force_sync_now().await);
        assert!(h.dirty(day));
        assert_eq!(h.publisher.current().status, SyncStatus::Error);

        h.gateway.heal(day);
        assert!(h.scheduler.force_sync_now().await);
        assert!(!h.dirty(day));
    }

    #[tokio::test(start_paused = true)]
    async fn force_sync_with_nothing_dirty_publishes_idle() {
        let h = harness(RecordingGateway::new());
        h.publisher.publish(SyncState::saved());
        assert!(h.scheduler.force_sync_now().await);
        assert_eq!(h.publisher.current(), SyncState::idle());
        assert!(h.gateway.saves().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn force_sync_cancels_pending_timer() {
        let h = harness(RecordingGateway::new());
        let day = date("2024-01-01");
        h.edit(day, "x");
        assert!(h.scheduler.has_pending());

        assert!(h.scheduler.force_sync_now().await);
        assert!(!h.scheduler.has_pending());

        tokio::time::sleep(DEBOUNCE * 2).await;
        assert_eq!(h.gateway.saves().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn edit_during_save_stays_dirty() {
        let h = harness(RecordingGateway::with_latency(Duration::from_secs(1)));
        let day = date("2024-01-01");
        h.edit(day, "first");

        let scheduler = h.scheduler.clone();
        let flush = tokio::spawn(async move { scheduler.force_sync_now().await });
        tokio::time::sleep(Duration::from_millis(500)).await;
        h.edit(day, "second");

        assert!(flush.await.unwrap());
        assert!(h.dirty(day));
        assert_eq!(lock_cache(&h.cache).display_content(day), "second");

        tokio::time::sleep(DEBOUNCE + Duration::from_secs(2)).await;
        assert!(!h.dirty(day));
        assert_eq!(
            h.gateway.saves(),
            vec![(day, "first".to_string()), (day, "second".to_string())]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn overlapping_timer_queues_follow_up_instead_of_parallel_loop() {
        let h = harness(RecordingGateway::with_latency(Duration::from_secs(5)));
        let (d1, d2) = (date("2024-01-01"), date("2024-01-02"));

        h.edit(d1, "one");
        // First loop starts at 3s and is busy until 8s.
        tokio::time::sleep(Duration::from_secs(4)).await;
        h.edit(d2, "two");
        // Second timer fires at 7s, mid-loop; the follow-up starts at 8s.
        tokio::time::sleep(Duration::from_millis(4500)).await;
        assert_eq!(h.gateway.saves().len(), 2);

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(h.gateway.max_in_flight(), 1);
        assert_eq!(
            h.gateway.saves(),
            vec![(d1, "one".to_string()), (d2, "two".to_string())]
        );
        assert!(!h.dirty(d1));
        assert!(!h.dirty(d2));
        assert_eq!(h.publisher.current().status, SyncStatus::Saved);
    }

    #[tokio::test(start_paused = true)]
    async fn newer_saved_state_is_not_reverted_early() {
        let h = harness(RecordingGateway::new());
        let day = date("2024-01-01");
        h.edit(day, "a");
        assert!(h.scheduler.force_sync_now().await);

        tokio::time::sleep(Duration::from_millis(1500)).await;
        h.edit(day, "ab");
        assert!(h.scheduler.force_sync_now().await);

        // The first revert would have fired here.
        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert_eq!(h.publisher.current().status, SyncStatus::Saved);

        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert_eq!(h.publisher.current().status, SyncStatus::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_cancels_pending_flush() {
        let h = harness(RecordingGateway::new());
        let day = date("2024-01-01");
        h.edit(day, "x");
        h.scheduler.shutdown();

        tokio::time::sleep(DEBOUNCE * 2).await;
        assert!(h.gateway.saves().is_empty());
        assert!(h.dirty(day));
    }

    #[tokio::test(start_paused = true)]
    async fn follow_up_request_is_visible_before_holder_releases() {
        let h = harness(RecordingGateway::new());
        let day = date("2024-01-01");
        lock_cache(&h.cache).update_local(day, "x");

        let held = h.scheduler.inner.flight.lock().await;
        Arc::clone(&h.scheduler.inner).run_debounced().await;
        assert!(h.gateway.saves().is_empty());
        drop(held);

        // Whoever held the lock checks this right after releasing it.
        assert!(h.scheduler.inner.follow_up.load(Ordering::SeqCst));
        Arc::clone(&h.scheduler.inner).run_debounced().await;
        assert_eq!(h.gateway.saves(), vec![(day, "x".to_string())]);
        assert!(!h.scheduler.inner.follow_up.load(Ordering::SeqCst));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn racing_flushes_leave_nothing_dirty() {
        let (d1, d2) = (date("2024-01-01"), date("2024-01-02"));
        for _ in 0..500 {
            let h = harness(RecordingGateway::new());
            lock_cache(&h.cache).update_local(d1, "one");
            let first = tokio::spawn(Arc::clone(&h.scheduler.inner).run_debounced());
            lock_cache(&h.cache).update_local(d2, "two");
            let second = tokio::spawn(Arc::clone(&h.scheduler.inner).run_debounced());

            first.await.unwrap();
            second.await.unwrap();
            assert!(!h.dirty(d1));
            assert!(!h.dirty(d2));
            assert_eq!(h.gateway.max_in_flight(), 1);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn loop_started_before_shutdown_stops_publishing() {
        let h = harness(RecordingGateway::with_latency(Duration::from_secs(5)));
        let day = date("2024-01-01");
        h.edit(day, "x");

        tokio::time::sleep(DEBOUNCE + Duration::from_millis(500)).await;
        assert_eq!(h.publisher.current().status, SyncStatus::Saving);
        h.scheduler.shutdown();
        h.publisher.publish(SyncState::idle());

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(h.gateway.saves().len(), 1);
        assert!(!h.dirty(day));
        assert_eq!(h.publisher.current(), SyncState::idle());
    }

    #[test]
    fn schedule_without_runtime_does_not_panic() {
        let h = harness(RecordingGateway::new());
        let day = date("2024-01-01");
        h.edit(day, "x");
        assert!(h.dirty(day));
        assert!(!h.scheduler.has_pending());
    }
}
