//! Image hosting through the backend's Chevereto proxy.
//!
//! The backend keeps per-user Chevereto credentials and forwards uploads, so
//! the client only ever talks to `/api/chevereto/*` with its session token.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;

use crate::auth::{AuthError, SessionPersistence};
use crate::models::CheveretoSettings;
use crate::pocketbase::parse_api_error;
use crate::util::normalize_base_url;

const SETTINGS_ROUTE: &str = "/api/chevereto/settings";
const TEST_ROUTE: &str = "/api/chevereto/test";
const UPLOAD_ROUTE: &str = "/api/chevereto/upload";

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("Invalid image hosting configuration: {0}")]
    InvalidConfiguration(String),
    #[error("{0}")]
    Validation(String),
    #[error("Not signed in")]
    NotAuthenticated,
    #[error("Session error: {0}")]
    Session(#[from] AuthError),
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Image hosting error: {0}")]
    Api(String),
    #[error("Invalid image hosting response: {0}")]
    InvalidPayload(String),
}

pub type MediaResult<T> = Result<T, MediaError>;

/// Outcome of probing a Chevereto instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionTestResult {
    pub success: bool,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Serialize)]
struct ConnectionTestPayload<'a> {
    domain: &'a str,
    api_key: &'a str,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    url: Option<String>,
}

/// Client for the backend's Chevereto routes.
#[derive(Clone)]
pub struct CheveretoClient<S: SessionPersistence> {
    base_url: String,
    client: Client,
    store: S,
}

impl<S: SessionPersistence> CheveretoClient<S> {
    pub fn new(base_url: impl AsRef<str>, store: S) -> MediaResult<Self> {
        let base_url =
            normalize_base_url(base_url.as_ref()).map_err(MediaError::InvalidConfiguration)?;
        Ok(Self {
            base_url,
            client: Client::builder().build()?,
            store,
        })
    }

    /// Read the stored settings, failing on any error.
    pub async fn fetch_settings(&self) -> MediaResult<CheveretoSettings> {
        let request = self.authorized(self.client.get(self.url(SETTINGS_ROUTE)))?;
        let body = expect_success(request.send().await?).await?;
        serde_json::from_str(&body).map_err(|error| MediaError::InvalidPayload(error.to_string()))
    }

    /// Read the stored settings; any failure yields disabled defaults.
    pub async fn get_settings(&self) -> CheveretoSettings {
        match self.fetch_settings().await {
            Ok(settings) => settings,
            Err(error) => {
                tracing::warn!("Failed to fetch image hosting settings: {error}");
                CheveretoSettings::default()
            }
        }
    }

    /// Validate and store settings; returns what was sent.
    pub async fn save_settings(&self, settings: &CheveretoSettings) -> MediaResult<CheveretoSettings> {
        let settings = settings.normalized();
        settings.validate().map_err(MediaError::Validation)?;

        let request = self.authorized(self.client.put(self.url(SETTINGS_ROUTE)).json(&settings))?;
        expect_success(request.send().await?).await?;
        tracing::info!(enabled = settings.enabled, "Saved image hosting settings");
        Ok(settings)
    }

    /// Ask the backend to check `domain` with `api_key` without saving them.
    pub async fn test_connection(
        &self,
        domain: &str,
        api_key: &str,
    ) -> MediaResult<ConnectionTestResult> {
        let domain = domain.trim().trim_end_matches('/');
        let api_key = api_key.trim();
        if domain.is_empty() || api_key.is_empty() {
            return Err(MediaError::Validation(
                "Domain and API Key are required".to_string(),
            ));
        }

        let payload = ConnectionTestPayload { domain, api_key };
        let request = self.authorized(self.client.post(self.url(TEST_ROUTE)).json(&payload))?;
        let body = expect_success(request.send().await?).await?;
        serde_json::from_str(&body).map_err(|error| MediaError::InvalidPayload(error.to_string()))
    }

    /// Upload an image and return its public URL.
    pub async fn upload(&self, file_name: &str, bytes: Vec<u8>) -> MediaResult<String> {
        let file_name = file_name.trim();
        if file_name.is_empty() {
            return Err(MediaError::Validation("File name is required".to_string()));
        }
        if bytes.is_empty() {
            return Err(MediaError::Validation("Image is empty".to_string()));
        }

        let size = bytes.len();
        let form = Form::new().part("source", Part::bytes(bytes).file_name(file_name.to_string()));
        let request = self.authorized(self.client.post(self.url(UPLOAD_ROUTE)).multipart(form))?;
        let body = expect_success(request.send().await?).await?;
        let url = parse_upload_url(&body)?;
        tracing::info!(file_name, size, "Uploaded image");
        Ok(url)
    }

    fn url(&self, route: &str) -> String {
        format!("{}{route}", self.base_url)
    }

    fn authorized(&self, request: RequestBuilder) -> MediaResult<RequestBuilder> {
        let session = self
            .store
            .load_session()?
            .ok_or(MediaError::NotAuthenticated)?;
        Ok(request
            .bearer_auth(session.token)
            .header("Accept", "application/json"))
    }
}

async fn expect_success(response: Response) -> MediaResult<String> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(MediaError::Api(parse_api_error(status, &body)));
    }
    Ok(body)
}

fn parse_upload_url(body: &str) -> MediaResult<String> {
    let payload = serde_json::from_str::<UploadResponse>(body)
        .map_err(|error| MediaError::InvalidPayload(error.to_string()))?;
    payload
        .url
        .filter(|url| !url.trim().is_empty())
        .ok_or_else(|| MediaError::InvalidPayload("No image URL in upload response".to_string()))
}

/// Shared, observable copy of the user's image hosting settings.
#[derive(Clone, Debug)]
pub struct CheveretoSettingsStore {
    sender: Arc<watch::Sender<CheveretoSettings>>,
    loaded: Arc<AtomicBool>,
}

impl Default for CheveretoSettingsStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CheveretoSettingsStore {
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = watch::channel(CheveretoSettings::default());
        Self {
            sender: Arc::new(sender),
            loaded: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Fetch settings into the store. On failure the current value is kept
    /// and the store stays unloaded.
    pub async fn load<S: SessionPersistence>(&self, client: &CheveretoClient<S>) -> CheveretoSettings {
        match client.fetch_settings().await {
            Ok(settings) => {
                self.set(settings.clone());
                settings
            }
            Err(error) => {
                tracing::warn!("Failed to load image hosting settings: {error}");
                CheveretoSettings::default()
            }
        }
    }

    /// Replace the cached settings, e.g. after a successful save.
    pub fn set(&self, settings: CheveretoSettings) {
        self.sender.send_replace(settings);
        self.loaded.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn settings(&self) -> CheveretoSettings {
        self.sender.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<CheveretoSettings> {
        self.sender.subscribe()
    }

    pub fn reset(&self) {
        self.sender.send_replace(CheveretoSettings::default());
        self.loaded.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::auth::MemorySessionStore;

    fn client() -> CheveretoClient<MemorySessionStore> {
        CheveretoClient::new("http://127.0.0.1:9/", MemorySessionStore::default()).unwrap()
    }

    fn enabled_settings() -> CheveretoSettings {
        CheveretoSettings {
            enabled: true,
            domain: "https://img.example.com/".to_string(),
            api_key: "key".to_string(),
            album_id: String::new(),
        }
    }

    #[test]
    fn new_rejects_invalid_base_url() {
        assert!(matches!(
            CheveretoClient::new("img.example.com", MemorySessionStore::default()),
            Err(MediaError::InvalidConfiguration(_))
        ));
        assert_eq!(client().url(UPLOAD_ROUTE), "http://127.0.0.1:9/api/chevereto/upload");
    }

    #[test]
    fn upload_response_requires_url() {
        assert_eq!(
            parse_upload_url(r#"{"url":"https://img.example.com/i/abc.png"}"#).unwrap(),
            "https://img.example.com/i/abc.png"
        );
        assert!(matches!(
            parse_upload_url(r#"{"message":"ok"}"#),
            Err(MediaError::InvalidPayload(_))
        ));
        assert!(matches!(
            parse_upload_url(r#"{"url":" "}"#),
            Err(MediaError::InvalidPayload(_))
        ));
        assert!(parse_upload_url("not json").is_err());
    }

    #[test]
    fn connection_test_result_tolerates_missing_message() {
        let result: ConnectionTestResult = serde_json::from_str(r#"{"success":true}"#).unwrap();
        assert!(result.success);
        assert_eq!(result.message, "");
    }

    #[tokio::test]
    async fn save_validates_before_sending() {
        let settings = CheveretoSettings {
            api_key: String::new(),
            ..enabled_settings()
        };
        let error = client().save_settings(&settings).await.unwrap_err();
        assert_eq!(
            error.to_string(),
            "Domain and API Key are required to enable Chevereto"
        );
    }

    #[tokio::test]
    async fn requests_without_session_fail_locally() {
        let client = client();
        assert!(matches!(
            client.save_settings(&enabled_settings()).await,
            Err(MediaError::NotAuthenticated)
        ));
        assert!(matches!(
            client.upload("a.png", vec![1, 2, 3]).await,
            Err(MediaError::NotAuthenticated)
        ));
        assert_eq!(client.get_settings().await, CheveretoSettings::default());
    }

    #[tokio::test]
    async fn upload_and_connection_test_validate_arguments() {
        let client = client();
        assert!(matches!(
            client.upload("a.png", Vec::new()).await,
            Err(MediaError::Validation(_))
        ));
        assert!(matches!(
            client.upload("  ", vec![1]).await,
            Err(MediaError::Validation(_))
        ));
        assert!(matches!(
            client.test_connection("https://img.example.com", " ").await,
            Err(MediaError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn store_load_failure_keeps_defaults() {
        let store = CheveretoSettingsStore::new();
        let loaded = store.load(&client()).await;

        assert_eq!(loaded, CheveretoSettings::default());
        assert!(!store.is_loaded());
        assert_eq!(store.settings(), CheveretoSettings::default());
    }

    #[test]
    fn store_set_and_reset() {
        let store = CheveretoSettingsStore::new();
        let mut receiver = store.subscribe();

        store.set(enabled_settings().normalized());
        assert!(store.is_loaded());
        assert!(receiver.has_changed().unwrap());
        assert_eq!(receiver.borrow_and_update().domain, "https://img.example.com");

        store.reset();
        assert!(!store.is_loaded());
        assert_eq!(store.settings(), CheveretoSettings::default());
    }
}
