//! Client configuration.
//!
//! Provides `ClientConfig`, the backend endpoint plus sync timing used by the
//! CLI and any other front-end that embeds the diary session.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::util::{normalize_base_url, normalize_text_option};

/// Quiescence window before buffered edits are flushed.
pub const DEFAULT_SYNC_DEBOUNCE_MS: u64 = 3000;
/// How long the transient "saved" status stays visible.
pub const DEFAULT_SAVED_DISPLAY_MS: u64 = 2000;

pub const API_URL_ENV: &str = "DIARUM_API_URL";
pub const SYNC_DEBOUNCE_ENV: &str = "DIARUM_SYNC_DEBOUNCE_MS";
pub const SAVED_DISPLAY_ENV: &str = "DIARUM_SAVED_DISPLAY_MS";

/// Timing knobs for the diary sync scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncConfig {
    pub debounce: Duration,
    pub saved_display: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(DEFAULT_SYNC_DEBOUNCE_MS),
            saved_display: Duration::from_millis(DEFAULT_SAVED_DISPLAY_MS),
        }
    }
}

/// Backend endpoint and sync timing for a client session.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    /// Backend root, e.g. `https://diary.example.com`
    #[serde(default)]
    pub api_url: Option<String>,
    #[serde(default)]
    pub sync_debounce_ms: Option<u64>,
    #[serde(default)]
    pub saved_display_ms: Option<u64>,
}

impl ClientConfig {
    /// Read configuration from `DIARUM_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        Ok(Self {
            api_url: normalize_text_option(lookup(API_URL_ENV)),
            sync_debounce_ms: parse_millis(lookup(SYNC_DEBOUNCE_ENV), SYNC_DEBOUNCE_ENV)?,
            saved_display_ms: parse_millis(lookup(SAVED_DISPLAY_ENV), SAVED_DISPLAY_ENV)?,
        })
    }

    /// Layer `other` on top of `self`; values set in `other` win.
    #[must_use]
    pub fn merged_with(self, other: Self) -> Self {
        Self {
            api_url: normalize_text_option(other.api_url).or(self.api_url),
            sync_debounce_ms: other.sync_debounce_ms.or(self.sync_debounce_ms),
            saved_display_ms: other.saved_display_ms.or(self.saved_display_ms),
        }
    }

    /// Returns the validated backend base URL without a trailing slash.
    pub fn api_base_url(&self) -> Result<String> {
        let url = normalize_text_option(self.api_url.clone()).ok_or_else(|| {
            Error::Config(format!("backend URL is not configured (set {API_URL_ENV})"))
        })?;
        normalize_base_url(&url).map_err(|error| Error::Config(format!("backend URL: {error}")))
    }

    pub fn sync(&self) -> SyncConfig {
        let defaults = SyncConfig::default();
        SyncConfig {
            debounce: self
                .sync_debounce_ms
                .map_or(defaults.debounce, Duration::from_millis),
            saved_display: self
                .saved_display_ms
                .map_or(defaults.saved_display, Duration::from_millis),
        }
    }
}

fn parse_millis(raw: Option<String>, key: &str) -> Result<Option<u64>> {
    let Some(raw) = normalize_text_option(raw) else {
        return Ok(None);
    };
    raw.parse::<u64>()
        .map(Some)
        .map_err(|_| {
            Error::Config(format!(
                "{key} must be a whole number of milliseconds, got '{raw}'"
            ))
        })
}
