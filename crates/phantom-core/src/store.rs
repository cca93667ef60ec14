//! Durable key-value storage for session tokens.
//!
//! [`TokenStore`] is the only way the rest of the client touches persisted
//! state. The credential helpers in [`CredentialStoreExt`] are layered on top
//! of it and enforce the all-or-nothing rule for the four session keys.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use tracing::{debug, warn};

use crate::Result;
use crate::credentials::Credentials;
use crate::tokens::{AccessToken, RefreshToken};

/// Key for the access token.
pub const ACCESS_TOKEN_KEY: &str = "access_token";

/// Key for the refresh token.
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";

/// Key for the username.
pub const USERNAME_KEY: &str = "username";

/// Key for the numeric user id, stored as a decimal string.
pub const USER_ID_KEY: &str = "user_id";

/// All keys that make up a persisted session.
pub const CREDENTIAL_KEYS: [&str; 4] = [
    ACCESS_TOKEN_KEY,
    REFRESH_TOKEN_KEY,
    USERNAME_KEY,
    USER_ID_KEY,
];

/// A durable string-keyed store.
///
/// Implementations perform no validation of values. Entries survive until
/// they are explicitly removed.
pub trait TokenStore: Send + Sync {
    /// Read a value, or `None` if the key is absent.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a value, replacing any previous one.
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove a key. Removing an absent key is not an error.
    fn remove(&self, key: &str) -> Result<()>;
}

/// Session-level operations on any [`TokenStore`].
pub trait CredentialStoreExt: TokenStore {
    /// Load the full credential set.
    ///
    /// Returns `None` if any key is missing or the user id is not an integer.
    fn load_credentials(&self) -> Result<Option<Credentials>> {
        let access = self.get(ACCESS_TOKEN_KEY)?;
        let refresh = self.get(REFRESH_TOKEN_KEY)?;
        let username = self.get(USERNAME_KEY)?;
        let user_id = self.get(USER_ID_KEY)?;

        let (Some(access), Some(refresh), Some(username), Some(user_id)) =
            (access, refresh, username, user_id)
        else {
            debug!("Stored credentials incomplete");
            return Ok(None);
        };

        let Ok(user_id) = user_id.trim().parse::<i64>() else {
            warn!(user_id = %user_id, "Stored user id is not an integer");
            return Ok(None);
        };

        Ok(Some(Credentials::new(
            AccessToken::new(access),
            RefreshToken::new(refresh),
            username,
            user_id,
        )))
    }

    /// Persist all four credential fields.
    fn save_credentials(&self, credentials: &Credentials) -> Result<()> {
        self.set(ACCESS_TOKEN_KEY, credentials.access_token.as_str())?;
        self.set(REFRESH_TOKEN_KEY, credentials.refresh_token.as_str())?;
        self.set(USERNAME_KEY, &credentials.username)?;
        self.set(USER_ID_KEY, &credentials.user_id.to_string())?;
        Ok(())
    }

    /// Remove all four credential fields.
    ///
    /// Every key is attempted even if an earlier removal fails; the first
    /// error is returned.
    fn clear_credentials(&self) -> Result<()> {
        let mut first_error = None;
        for key in CREDENTIAL_KEYS {
            if let Err(e) = self.remove(key) {
                warn!(key, error = %e, "Failed to remove credential key");
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// The stored access token, if any.
    fn access_token(&self) -> Result<Option<AccessToken>> {
        Ok(self.get(ACCESS_TOKEN_KEY)?.map(AccessToken::new))
    }

    /// The stored refresh token, if any.
    fn refresh_token(&self) -> Result<Option<RefreshToken>> {
        Ok(self.get(REFRESH_TOKEN_KEY)?.map(RefreshToken::new))
    }

    /// Replace only the access token, leaving identity fields untouched.
    fn set_access_token(&self, token: &AccessToken) -> Result<()> {
        self.set(ACCESS_TOKEN_KEY, token.as_str())
    }
}

impl<T: TokenStore + ?Sized> CredentialStoreExt for T {}

/// An in-process [`TokenStore`].
///
/// Durable only for the lifetime of the value; useful for tests and for
/// embedding where the host provides its own persistence.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with the given entries.
    pub fn with_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            entries: Mutex::new(
                entries
                    .into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_store() -> MemoryTokenStore {
        MemoryTokenStore::with_entries([
            (ACCESS_TOKEN_KEY, "access"),
            (REFRESH_TOKEN_KEY, "refresh"),
            (USERNAME_KEY, "alice"),
            (USER_ID_KEY, "7"),
        ])
    }

    #[test]
    fn get_set_remove() {
        let store = MemoryTokenStore::new();
        assert_eq!(store.get("k").unwrap(), None);
        store.set("k", "v").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("v"));
        store.remove("k").unwrap();
        assert_eq!(store.get("k").unwrap(), None);
        store.remove("k").unwrap();
    }

    #[test]
    fn loads_complete_credentials() {
        let creds = full_store().load_credentials().unwrap().unwrap();
        assert_eq!(creds.access_token.as_str(), "access");
        assert_eq!(creds.refresh_token.as_str(), "refresh");
        assert_eq!(creds.username, "alice");
        assert_eq!(creds.user_id, 7);
    }

    #[test]
    fn partial_credentials_are_absent() {
        for missing in CREDENTIAL_KEYS {
            let store = full_store();
            store.remove(missing).unwrap();
            assert!(
                store.load_credentials().unwrap().is_none(),
                "expected no credentials without {missing}"
            );
        }
    }

    #[test]
    fn non_numeric_user_id_is_absent() {
        let store = full_store();
        store.set(USER_ID_KEY, "seven").unwrap();
        assert!(store.load_credentials().unwrap().is_none());
    }

    #[test]
    fn save_then_clear() {
        let store = MemoryTokenStore::new();
        let creds = Credentials::new(
            AccessToken::new("a"),
            RefreshToken::new("r"),
            "bob",
            42,
        );
        store.save_credentials(&creds).unwrap();
        assert_eq!(store.len(), 4);
        assert_eq!(store.get(USER_ID_KEY).unwrap().as_deref(), Some("42"));
        assert_eq!(store.load_credentials().unwrap(), Some(creds));

        store.clear_credentials().unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn set_access_token_keeps_identity() {
        let store = full_store();
        store.set_access_token(&AccessToken::new("fresh")).unwrap();
        let creds = store.load_credentials().unwrap().unwrap();
        assert_eq!(creds.access_token.as_str(), "fresh");
        assert_eq!(creds.username, "alice");
        assert_eq!(creds.user_id, 7);
    }
}
