//! Persistent CLI configuration.

use std::path::{Path, PathBuf};

use diarum_core::config::ClientConfig;
use diarum_core::util::{normalize_base_url, normalize_text_option};
use serde::{Deserialize, Serialize};

const CONFIG_FILE_NAME: &str = "cli-config.json";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CliConfig {
    #[serde(default = "default_config_version")]
    pub version: u32,
    #[serde(default)]
    pub api_url: Option<String>,
    #[serde(default)]
    pub sync_debounce_ms: Option<u64>,
    #[serde(default)]
    pub saved_display_ms: Option<u64>,
}

const fn default_config_version() -> u32 {
    1
}

pub fn default_config_path() -> Result<PathBuf, String> {
    dirs::config_dir()
        .map(|dir| dir.join("diarum").join(CONFIG_FILE_NAME))
        .ok_or_else(|| "Failed to resolve CLI config directory".to_string())
}

impl CliConfig {
    pub fn load() -> Result<Self, String> {
        Self::load_from_path(&default_config_path()?)
    }

    pub fn load_from_path(path: &Path) -> Result<Self, String> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)
            .map_err(|error| format!("Failed to read config at {}: {}", path.display(), error))?;
        let mut config = serde_json::from_str::<Self>(&raw)
            .map_err(|error| format!("Failed to parse config at {}: {}", path.display(), error))?;
        config.normalize();
        Ok(config)
    }

    pub fn save(&self) -> Result<PathBuf, String> {
        let path = default_config_path()?;
        self.save_to_path(&path)?;
        Ok(path)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|error| {
                format!(
                    "Failed to create config directory {}: {}",
                    parent.display(),
                    error
                )
            })?;
        }

        let mut normalized = self.clone();
        normalized.normalize();
        let serialized = serde_json::to_string_pretty(&normalized)
            .map_err(|error| format!("Failed to serialize config: {error}"))?;
        std::fs::write(path, serialized)
            .map_err(|error| format!("Failed to write config at {}: {}", path.display(), error))
    }

    /// Store a backend URL after validating its scheme.
    pub fn set_api_url(&mut self, raw: &str) -> Result<(), String> {
        let url = normalize_base_url(raw).map_err(|error| format!("--api-url: {error}"))?;
        self.api_url = Some(url);
        Ok(())
    }

    /// File values as a [`ClientConfig`], before environment overrides.
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            api_url: normalize_text_option(self.api_url.clone()),
            sync_debounce_ms: self.sync_debounce_ms,
            saved_display_ms: self.saved_display_ms,
        }
    }

    fn normalize(&mut self) {
        self.api_url = normalize_text_option(self.api_url.clone())
            .map(|url| url.trim_end_matches('/').to_string());
    }
}

/// File configuration with `DIARUM_*` environment variables layered on top.
pub fn resolve_client_config(file: &CliConfig) -> diarum_core::Result<ClientConfig> {
    Ok(file.client_config().merged_with(ClientConfig::from_env()?))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn temp_config_path() -> PathBuf {
        std::env::temp_dir().join(format!(
            "diarum-cli-config-test-{}-{}.json",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map_or(0, |duration| duration.as_nanos())
        ))
    }

    #[test]
    fn missing_file_loads_defaults() {
        let config = CliConfig::load_from_path(&temp_config_path()).unwrap();
        assert_eq!(config, CliConfig::default());
        assert_eq!(config.client_config(), ClientConfig::default());
    }

    #[test]
    fn config_roundtrip_normalizes_url() {
        let path = temp_config_path();
        let config = CliConfig {
            version: 1,
            api_url: Some(" https://diary.example.com/ ".to_string()),
            sync_debounce_ms: Some(1500),
            saved_display_ms: None,
        };

        config.save_to_path(&path).unwrap();
        let loaded = CliConfig::load_from_path(&path).unwrap();
        assert_eq!(loaded.api_url.as_deref(), Some("https://diary.example.com"));
        assert_eq!(loaded.sync_debounce_ms, Some(1500));
        assert_eq!(
            loaded.client_config().sync().debounce,
            std::time::Duration::from_millis(1500)
        );

        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn corrupt_file_reports_path() {
        let path = temp_config_path();
        std::fs::write(&path, "{not json").unwrap();

        let error = CliConfig::load_from_path(&path).unwrap_err();
        assert!(error.contains(&path.display().to_string()));

        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn set_api_url_requires_http_scheme() {
        let mut config = CliConfig::default();
        assert!(config.set_api_url("diary.example.com").is_err());
        assert_eq!(config.api_url, None);

        config.set_api_url("http://localhost:8090/").unwrap();
        assert_eq!(config.api_url.as_deref(), Some("http://localhost:8090"));
    }
}
