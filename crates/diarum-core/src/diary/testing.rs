//! In-memory gateway used by the scheduler and session tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use super::gateway::{DiaryGateway, GatewayError, GatewayResult};
use crate::models::{Diary, DiaryDate};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Error,
    Rejected,
}

/// Records every save, optionally delaying or failing it per date.
#[derive(Debug, Default)]
pub struct RecordingGateway {
    latency: Duration,
    saves: Mutex<Vec<(DiaryDate, String)>>,
    failures: Mutex<HashMap<DiaryDate, Outcome>>,
    stored: Mutex<HashMap<DiaryDate, Diary>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl RecordingGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency,
            ..Self::default()
        }
    }

    pub fn fail(&self, date: DiaryDate, outcome: Outcome) {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(date, outcome);
    }

    pub fn heal(&self, date: DiaryDate) {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&date);
    }

    pub fn store(&self, diary: Diary) {
        self.stored
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(diary.date, diary);
    }

    pub fn saves(&self) -> Vec<(DiaryDate, String)> {
        self.saves
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn saved_dates(&self) -> HashSet<DiaryDate> {
        self.saves().into_iter().map(|(date, _)| date).collect()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DiaryGateway for RecordingGateway {
    async fn fetch_diary(&self, date: DiaryDate) -> GatewayResult<Option<Diary>> {
        Ok(self
            .stored
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&date)
            .cloned())
    }

    async fn save_diary(&self, date: DiaryDate, content: &str) -> GatewayResult<bool> {
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);
        self.saves
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((date, content.to_string()));

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let failure = self
            .failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&date)
            .copied();
        match failure {
            Some(Outcome::Error) => Err(GatewayError::Api("simulated outage (503)".to_string())),
            Some(Outcome::Rejected) => Ok(false),
            None => Ok(true),
        }
    }
}
