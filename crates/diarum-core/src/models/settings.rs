//! Image hosting settings model

use std::fmt;

use serde::{Deserialize, Serialize};

/// Per-user Chevereto image hosting settings.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheveretoSettings {
    /// Whether uploads should go to Chevereto
    #[serde(default)]
    pub enabled: bool,
    /// Chevereto instance root, e.g. `https://img.example.com`
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub api_key: String,
    /// Optional album uploads are filed into
    #[serde(default)]
    pub album_id: String,
}

impl CheveretoSettings {
    /// Trim all fields and strip trailing slashes from the domain.
    #[must_use]
    pub fn normalized(&self) -> Self {
        Self {
            enabled: self.enabled,
            domain: self.domain.trim().trim_end_matches('/').to_string(),
            api_key: self.api_key.trim().to_string(),
            album_id: self.album_id.trim().to_string(),
        }
    }

    /// Enabled settings need both a domain and an API key.
    pub fn validate(&self) -> Result<(), String> {
        if self.enabled && (self.domain.trim().is_empty() || self.api_key.trim().is_empty()) {
            return Err("Domain and API Key are required to enable Chevereto".to_string());
        }
        Ok(())
    }
}

impl fmt::Debug for CheveretoSettings {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("CheveretoSettings")
            .field("enabled", &self.enabled)
            .field("domain", &self.domain)
            .field("api_key", &"[REDACTED]")
            .field("album_id", &self.album_id)
            .finish()
    }
}
