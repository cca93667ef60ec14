//! Session state and operation outcomes.

use serde::Serialize;

use crate::credentials::User;

/// The authentication state of the client.
///
/// Exactly one variant holds at any time. It starts as `Loading` and only
/// changes through [`SessionContext`](crate::SessionContext) transitions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "user", rename_all = "snake_case")]
pub enum SessionState {
    /// Stored credentials have not been checked yet.
    Loading,
    /// A verified session exists for this user.
    Authenticated(User),
    /// No usable session.
    Unauthenticated,
}

impl SessionState {
    pub fn is_loading(&self) -> bool {
        matches!(self, SessionState::Loading)
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::Authenticated(_))
    }

    /// The signed-in user, if any.
    pub fn user(&self) -> Option<&User> {
        match self {
            SessionState::Authenticated(user) => Some(user),
            _ => None,
        }
    }
}

/// Result of a login or registration attempt.
///
/// These operations never fail with an error; the failure message is
/// carried here so it can be displayed as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AuthOutcome {
    pub fn success() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}
