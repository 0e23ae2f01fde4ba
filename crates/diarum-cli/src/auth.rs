//! Keychain-backed session persistence for the CLI.

#[cfg(test)]
use std::collections::HashMap;
#[cfg(test)]
use std::sync::{Mutex, OnceLock};

#[cfg(not(test))]
use keyring::Entry;

use diarum_core::auth::{AuthResult, PocketBaseAuthClient, SessionPersistence};
pub use diarum_core::auth::{AuthError, AuthSession};

#[cfg(not(test))]
const KEYRING_SERVICE_NAME: &str = "diarum-cli";

/// Stores one session per backend URL.
#[derive(Clone)]
pub struct SessionStore {
    username: String,
}

impl SessionStore {
    pub fn for_backend(base_url: &str) -> Self {
        Self {
            username: format!("pocketbase_session:{base_url}"),
        }
    }

    #[cfg(test)]
    fn test_store() -> &'static Mutex<HashMap<String, String>> {
        static STORE: OnceLock<Mutex<HashMap<String, String>>> = OnceLock::new();
        STORE.get_or_init(|| Mutex::new(HashMap::new()))
    }

    #[cfg(not(test))]
    fn entry(&self) -> AuthResult<Entry> {
        Entry::new(KEYRING_SERVICE_NAME, &self.username)
            .map_err(|error| AuthError::SecureStorage(error.to_string()))
    }
}

impl SessionPersistence for SessionStore {
    #[cfg(not(test))]
    fn load_session(&self) -> AuthResult<Option<AuthSession>> {
        let entry = self.entry()?;
        match entry.get_password() {
            Ok(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(error) => Err(AuthError::SecureStorage(error.to_string())),
        }
    }

    #[cfg(test)]
    fn load_session(&self) -> AuthResult<Option<AuthSession>> {
        let store = Self::test_store();
        let guard = store
            .lock()
            .map_err(|error| AuthError::SecureStorage(error.to_string()))?;
        if let Some(raw) = guard.get(&self.username) {
            Ok(Some(serde_json::from_str(raw)?))
        } else {
            Ok(None)
        }
    }

    #[cfg(not(test))]
    fn save_session(&self, session: &AuthSession) -> AuthResult<()> {
        let raw = serde_json::to_string(session)?;
        self.entry()?
            .set_password(&raw)
            .map_err(|error| AuthError::SecureStorage(error.to_string()))?;
        Ok(())
    }

    #[cfg(test)]
    fn save_session(&self, session: &AuthSession) -> AuthResult<()> {
        let raw = serde_json::to_string(session)?;
        let store = Self::test_store();
        let mut guard = store
            .lock()
            .map_err(|error| AuthError::SecureStorage(error.to_string()))?;
        guard.insert(self.username.clone(), raw);
        Ok(())
    }

    #[cfg(not(test))]
    fn clear_session(&self) -> AuthResult<()> {
        let entry = self.entry()?;
        match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(error) => Err(AuthError::SecureStorage(error.to_string())),
        }
    }

    #[cfg(test)]
    fn clear_session(&self) -> AuthResult<()> {
        let store = Self::test_store();
        let mut guard = store
            .lock()
            .map_err(|error| AuthError::SecureStorage(error.to_string()))?;
        guard.remove(&self.username);
        Ok(())
    }
}

pub type AuthService = PocketBaseAuthClient<SessionStore>;

pub fn auth_service(base_url: &str) -> AuthResult<AuthService> {
    PocketBaseAuthClient::new(base_url, SessionStore::for_backend(base_url))
}

#[cfg(test)]
mod tests {
    use diarum_core::auth::AuthUser;
    use pretty_assertions::assert_eq;

    use super::*;

    fn session(token: &str) -> AuthSession {
        AuthSession {
            token: token.to_string(),
            user: AuthUser {
                id: "user1".to_string(),
                username: "writer".to_string(),
                email: None,
            },
        }
    }

    #[test]
    fn sessions_are_scoped_per_backend() {
        let home = SessionStore::for_backend("https://home.example.com");
        let work = SessionStore::for_backend("https://work.example.com");

        home.save_session(&session("home-token")).unwrap();
        assert_eq!(
            home.load_session().unwrap().map(|session| session.token),
            Some("home-token".to_string())
        );
        assert_eq!(work.load_session().unwrap(), None);

        home.clear_session().unwrap();
        assert_eq!(home.load_session().unwrap(), None);
    }

    #[test]
    fn logout_clears_session_without_network() {
        let service = auth_service("https://logout.example.com").unwrap();
        service.store().save_session(&session("token")).unwrap();

        service.logout().unwrap();
        assert_eq!(service.store().load_session().unwrap(), None);
        assert!(!service.is_logged_in());
    }
}
