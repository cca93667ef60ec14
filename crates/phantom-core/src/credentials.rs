//! Persisted session credentials.

use std::fmt;

use serde::Serialize;

use crate::tokens::{AccessToken, RefreshToken};

/// The authenticated user, as shown to the rest of the application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub username: String,
    pub user_id: i64,
}

/// The full set of values persisted for a session.
///
/// All four fields exist together or not at all. A store holding only some
/// of them is read back as "no credentials".
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_token: AccessToken,
    pub refresh_token: RefreshToken,
    pub username: String,
    pub user_id: i64,
}

impl Credentials {
    pub fn new(
        access_token: AccessToken,
        refresh_token: RefreshToken,
        username: impl Into<String>,
        user_id: i64,
    ) -> Self {
        Self {
            access_token,
            refresh_token,
            username: username.into(),
            user_id,
        }
    }

    /// The identity part of the credentials.
    pub fn user(&self) -> User {
        User {
            username: self.username.clone(),
            user_id: self.user_id,
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("user_id", &self.user_id)
            .field("tokens", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_hides_tokens() {
        let creds = Credentials::new(
            AccessToken::new("access-secret"),
            RefreshToken::new("refresh-secret"),
            "alice",
            7,
        );
        let debug = format!("{:?}", creds);
        assert!(debug.contains("alice"));
        assert!(!debug.contains("access-secret"));
        assert!(!debug.contains("refresh-secret"));
    }

    #[test]
    fn user_projection() {
        let creds = Credentials::new(AccessToken::new("a"), RefreshToken::new("r"), "alice", 7);
        assert_eq!(
            creds.user(),
            User {
                username: "alice".to_string(),
                user_id: 7
            }
        );
    }
}
