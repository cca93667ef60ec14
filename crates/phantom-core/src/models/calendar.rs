//! Google Calendar integration replies.

use serde::{Deserialize, Serialize};

/// Whether the signed-in user has linked a Google account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarStatus {
    pub connected: bool,
    /// Username the backend reports the status for.
    #[serde(default)]
    pub user: String,
}

/// Start of the OAuth flow. The user finishes it in a browser at
/// `authorization_url`; the backend handles the callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarConnect {
    pub authorization_url: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarDisconnect {
    #[serde(default)]
    pub message: String,
}
