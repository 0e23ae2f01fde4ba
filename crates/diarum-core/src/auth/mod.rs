//! PocketBase user auth client.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pocketbase::{parse_api_error, records_url, USERS_COLLECTION};
use crate::util::{normalize_base_url, unix_timestamp_now};

const EXPIRY_SKEW_SECONDS: i64 = 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
}

impl AuthUser {
    /// Best label for display: username, then email, then record id.
    #[must_use]
    pub fn display_name(&self) -> &str {
        if !self.username.trim().is_empty() {
            return &self.username;
        }
        self.email
            .as_deref()
            .filter(|email| !email.trim().is_empty())
            .unwrap_or(&self.id)
    }
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
    pub token: String,
    pub user: AuthUser,
}

impl AuthSession {
    /// Expiry (unix seconds) read from the token's `exp` claim.
    #[must_use]
    pub fn expires_at(&self) -> Option<i64> {
        token_expiry(&self.token)
    }

    /// Tokens without a readable `exp` claim are treated as expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at()
            .map_or(true, |expires_at| {
                expires_at <= unix_timestamp_now() + EXPIRY_SKEW_SECONDS
            })
    }
}

impl fmt::Debug for AuthSession {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("AuthSession")
            .field("token", &"[REDACTED]")
            .field("expires_at", &self.expires_at())
            .field("user", &self.user)
            .finish()
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct LoginCredentials {
    /// Username or email
    pub identity: String,
    pub password: String,
}

impl fmt::Debug for LoginCredentials {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("LoginCredentials")
            .field("identity", &self.identity)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct RegisterData {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(rename = "passwordConfirm")]
    pub password_confirm: String,
}

impl RegisterData {
    pub fn validate(&self) -> AuthResult<()> {
        if self.username.trim().is_empty() {
            return Err(AuthError::Validation("Username is required".to_string()));
        }
        if self.email.trim().is_empty() {
            return Err(AuthError::Validation("Email is required".to_string()));
        }
        if self.password.is_empty() {
            return Err(AuthError::Validation("Password is required".to_string()));
        }
        if self.password != self.password_confirm {
            return Err(AuthError::Validation("Passwords do not match".to_string()));
        }
        Ok(())
    }
}

impl fmt::Debug for RegisterData {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("RegisterData")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid auth configuration: {0}")]
    InvalidConfiguration(String),
    #[error("{0}")]
    Validation(String),
    #[error("Not signed in")]
    NotAuthenticated,
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Failed to parse JSON payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Auth API error: {0}")]
    Api(String),
    #[error("Secure storage error: {0}")]
    SecureStorage(String),
}

pub type AuthResult<T> = Result<T, AuthError>;

pub trait SessionPersistence: Clone + Send + Sync + 'static {
    fn load_session(&self) -> AuthResult<Option<AuthSession>>;
    fn save_session(&self, session: &AuthSession) -> AuthResult<()>;
    fn clear_session(&self) -> AuthResult<()>;
}

/// Process-local session store; sessions vanish with the process.
#[derive(Debug, Clone, Default)]
pub struct MemorySessionStore {
    session: Arc<Mutex<Option<AuthSession>>>,
}

impl SessionPersistence for MemorySessionStore {
    fn load_session(&self) -> AuthResult<Option<AuthSession>> {
        Ok(self
            .session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn save_session(&self, session: &AuthSession) -> AuthResult<()> {
        *self.session.lock().unwrap_or_else(PoisonError::into_inner) = Some(session.clone());
        Ok(())
    }

    fn clear_session(&self) -> AuthResult<()> {
        self.session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        Ok(())
    }
}

#[derive(Clone)]
pub struct PocketBaseAuthClient<S: SessionPersistence> {
    base_url: String,
    client: Client,
    store: S,
}

impl<S: SessionPersistence> PocketBaseAuthClient<S> {
    pub fn new(base_url: impl AsRef<str>, store: S) -> AuthResult<Self> {
        let base_url = normalize_base_url(base_url.as_ref())
            .map_err(|error| AuthError::InvalidConfiguration(format!("backend URL: {error}")))?;

        Ok(Self {
            base_url,
            client: Client::builder().build()?,
            store,
        })
    }

    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Sign in with a username or email and persist the session.
    pub async fn login(&self, credentials: &LoginCredentials) -> AuthResult<AuthSession> {
        if credentials.identity.trim().is_empty() {
            return Err(AuthError::Validation(
                "Username or email is required".to_string(),
            ));
        }
        if credentials.password.is_empty() {
            return Err(AuthError::Validation("Password is required".to_string()));
        }

        let payload = serde_json::json!({
            "identity": credentials.identity.trim(),
            "password": credentials.password,
        });
        let request = self
            .client
            .post(self.collection_url("auth-with-password"))
            .json(&payload);
        let session = self.send_auth_request(request).await?;
        self.store.save_session(&session)?;
        tracing::info!("Signed in as {}", session.user.display_name());
        Ok(session)
    }

    /// Create an account, then sign in with the new username.
    pub async fn register(&self, data: &RegisterData) -> AuthResult<AuthSession> {
        data.validate()?;

        let response = self
            .client
            .post(records_url(&self.base_url, USERS_COLLECTION))
            .json(data)
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Api(parse_api_error(status, &body)));
        }
        let record = response.json::<AuthUser>().await?;
        tracing::info!("Registered user record {}", record.id);

        self.login(&LoginCredentials {
            identity: data.username.clone(),
            password: data.password.clone(),
        })
        .await
    }

    /// Exchange the stored token for a fresh one.
    pub async fn refresh_session(&self) -> AuthResult<AuthSession> {
        let current = self.store.load_session()?.ok_or(AuthError::NotAuthenticated)?;
        let request = self
            .client
            .post(self.collection_url("auth-refresh"))
            .bearer_auth(&current.token);
        let session = self.send_auth_request(request).await?;
        self.store.save_session(&session)?;
        Ok(session)
    }

    /// Return the persisted session if it is still valid; expired ones are cleared.
    pub async fn restore_session(&self) -> AuthResult<Option<AuthSession>> {
        let Some(stored_session) = self.store.load_session()? else {
            return Ok(None);
        };

        if stored_session.is_expired() {
            tracing::warn!("Persisted session expired; signing out");
            self.store.clear_session()?;
            return Ok(None);
        }

        match self.refresh_session().await {
            Ok(refreshed) => Ok(Some(refreshed)),
            Err(AuthError::Http(error)) => {
                tracing::warn!("Could not refresh session, keeping stored token: {}", error);
                Ok(Some(stored_session))
            }
            Err(error) => {
                tracing::warn!("Failed to refresh persisted session: {}", error);
                self.store.clear_session()?;
                Ok(None)
            }
        }
    }

    /// Tokens are stateless on the backend, so signing out only drops the local session.
    pub fn logout(&self) -> AuthResult<()> {
        self.store.clear_session()
    }

    pub fn is_logged_in(&self) -> bool {
        match self.store.load_session() {
            Ok(Some(session)) => !session.is_expired(),
            Ok(None) => false,
            Err(error) => {
                tracing::warn!("Failed to read stored session: {}", error);
                false
            }
        }
    }

    pub fn current_user(&self) -> AuthResult<Option<AuthUser>> {
        Ok(self
            .store
            .load_session()?
            .filter(|session| !session.is_expired())
            .map(|session| session.user))
    }

    fn collection_url(&self, action: &str) -> String {
        format!(
            "{}/api/collections/{USERS_COLLECTION}/{action}",
            self.base_url
        )
    }

    async fn send_auth_request(&self, request: RequestBuilder) -> AuthResult<AuthSession> {
        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Api(parse_api_error(status, &body)));
        }
        let payload = response.json::<AuthResponse>().await?;
        payload.into_session()
    }
}

#[derive(Debug, Deserialize)]
struct AuthResponse {
    token: Option<String>,
    record: Option<AuthUser>,
}

impl AuthResponse {
    fn into_session(self) -> AuthResult<AuthSession> {
        match (self.token, self.record) {
            (Some(token), Some(user)) if !token.trim().is_empty() => Ok(AuthSession { token, user }),
            _ => Err(AuthError::Api(
                "Auth response did not include a token and user record".to_string(),
            )),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenClaims {
    exp: Option<i64>,
}

fn token_expiry(token: &str) -> Option<i64> {
    let payload = token.split('.').nth(1)?;
    let decoded = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    serde_json::from_slice::<TokenClaims>(&decoded).ok()?.exp
}

#[cfg(test)]
pub(crate) fn test_token(expires_at: i64) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let claims = URL_SAFE_NO_PAD.encode(format!(r#"{{"exp":{expires_at},"type":"authRecord"}}"#));
    format!("{header}.{claims}.signature")
}
