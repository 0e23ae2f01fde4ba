//! Remote diary storage.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use thiserror::Error;

use crate::auth::{AuthError, AuthSession, SessionPersistence};
use crate::models::{Diary, DiaryDate};
use crate::pocketbase::{
    filter_literal, parse_api_error, records_url, ListResponse, DIARIES_COLLECTION,
};
use crate::util::normalize_base_url;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Invalid diary API configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Not signed in")]
    NotAuthenticated,
    #[error("Session error: {0}")]
    Session(#[from] AuthError),
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Diary API error: {0}")]
    Api(String),
    #[error("Invalid diary payload: {0}")]
    InvalidPayload(String),
}

pub type GatewayResult<T> = Result<T, GatewayError>;

/// Backing store the write-back cache flushes into.
///
/// `save_diary` must be safe to call again with the same content.
#[async_trait]
pub trait DiaryGateway: Send + Sync {
    async fn fetch_diary(&self, date: DiaryDate) -> GatewayResult<Option<Diary>>;

    /// Persist `content` for `date`. `Ok(false)` means the backend declined the write.
    async fn save_diary(&self, date: DiaryDate, content: &str) -> GatewayResult<bool>;
}

/// Diary gateway over the PocketBase `diaries` collection.
///
/// Requests are authorized with whatever session the store currently holds.
#[derive(Clone)]
pub struct PocketBaseDiaryGateway<S: SessionPersistence> {
    base_url: String,
    client: Client,
    store: S,
}

#[derive(Debug, Serialize)]
struct CreateDiaryPayload<'a> {
    date: String,
    content: &'a str,
    owner: &'a str,
}

#[derive(Debug, Serialize)]
struct UpdateDiaryPayload<'a> {
    content: &'a str,
}

impl<S: SessionPersistence> PocketBaseDiaryGateway<S> {
    pub fn new(base_url: impl AsRef<str>, store: S) -> GatewayResult<Self> {
        let base_url =
            normalize_base_url(base_url.as_ref()).map_err(GatewayError::InvalidConfiguration)?;
        Ok(Self {
            base_url,
            client: Client::builder().build()?,
            store,
        })
    }

    fn session(&self) -> GatewayResult<AuthSession> {
        self.store
            .load_session()?
            .ok_or(GatewayError::NotAuthenticated)
    }

    async fn find_record(
        &self,
        session: &AuthSession,
        date: DiaryDate,
    ) -> GatewayResult<Option<Diary>> {
        let (start, end) = date.backend_range();
        let filter = format!(
            "owner = {} && date >= {} && date <= {}",
            filter_literal(&session.user.id),
            filter_literal(&start),
            filter_literal(&end)
        );
        let url = format!(
            "{}?perPage=1&filter={}",
            records_url(&self.base_url, DIARIES_COLLECTION),
            urlencoding::encode(&filter)
        );

        let response = self
            .client
            .get(url)
            .bearer_auth(&session.token)
            .header("Accept", "application/json")
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Api(parse_api_error(status, &body)));
        }

        let body = response.text().await?;
        let listing = serde_json::from_str::<ListResponse<Diary>>(&body)
            .map_err(|error| GatewayError::InvalidPayload(error.to_string()))?;
        Ok(listing.items.into_iter().next())
    }
}

#[async_trait]
impl<S: SessionPersistence> DiaryGateway for PocketBaseDiaryGateway<S> {
    async fn fetch_diary(&self, date: DiaryDate) -> GatewayResult<Option<Diary>> {
        let session = self.session()?;
        self.find_record(&session, date).await
    }

    async fn save_diary(&self, date: DiaryDate, content: &str) -> GatewayResult<bool> {
        let session = self.session()?;
        let collection_url = records_url(&self.base_url, DIARIES_COLLECTION);

        let request = match self.find_record(&session, date).await? {
            Some(existing) => self
                .client
                .patch(format!("{collection_url}/{}", existing.id))
                .json(&UpdateDiaryPayload { content }),
            None => self.client.post(collection_url).json(&CreateDiaryPayload {
                date: date.backend_timestamp(),
                content,
                owner: &session.user.id,
            }),
        };

        let response = request.bearer_auth(&session.token).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Api(parse_api_error(status, &body)));
        }
        tracing::debug!(%date, "diary saved");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::MemorySessionStore;

    #[test]
    fn new_rejects_invalid_base_url() {
        assert!(matches!(
            PocketBaseDiaryGateway::new("", MemorySessionStore::default()),
            Err(GatewayError::InvalidConfiguration(_))
        ));
    }

    #[tokio::test]
    async fn calls_without_session_fail_before_any_request() {
        let gateway =
            PocketBaseDiaryGateway::new("http://127.0.0.1:9", MemorySessionStore::default())
                .unwrap();
        let date = "2024-01-01".parse().unwrap();

        assert!(matches!(
            gateway.save_diary(date, "x").await,
            Err(GatewayError::NotAuthenticated)
        ));
        assert!(matches!(
            gateway.fetch_diary(date).await,
            Err(GatewayError::NotAuthenticated)
        ));
    }

    #[test]
    fn create_payload_uses_backend_date_format() {
        let date: DiaryDate = "2024-01-01".parse().unwrap();
        let payload = CreateDiaryPayload {
            date: date.backend_timestamp(),
            content: "<p>hi</p>",
            owner: "user1",
        };
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["date"], "2024-01-01 00:00:00.000Z");
        assert_eq!(value["owner"], "user1");
    }
}
