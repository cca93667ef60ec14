//! Endpoint paths and request/response bodies.
//!
//! Paths are relative to the configured API base URL and keep the
//! backend's trailing slashes.

use serde::{Deserialize, Serialize};

// ============================================================================
// Authentication
// ============================================================================

pub const LOGIN: &str = "auth/login/";

pub const REGISTER: &str = "auth/register/";

pub const TOKEN_REFRESH: &str = "auth/token/refresh/";

pub const LOGOUT: &str = "auth/logout/";

// ============================================================================
// Resources
// ============================================================================

pub const EVENTS: &str = "events/";

pub const CATEGORIES: &str = "categories/";

pub const CHAT: &str = "chat/";

pub const CHAT_HISTORY: &str = "chat/history/";

pub const PREFERENCES: &str = "preferences/";

/// The preferences viewset routes updates through a detail URL whose key
/// it ignores.
pub const PREFERENCES_UPDATE: &str = "preferences/me/";

// Google Calendar integration. The backend mounts the integrations app
// under `integrations/`.

pub const GOOGLE_CALENDAR_STATUS: &str = "integrations/google-calendar/status/";

pub const GOOGLE_CALENDAR_CONNECT: &str = "integrations/google-calendar/connect/";

pub const GOOGLE_CALENDAR_DISCONNECT: &str = "integrations/google-calendar/disconnect/";

/// `events/{id}/`
pub fn event(id: i64) -> String {
    format!("{EVENTS}{id}/")
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Serialize)]
pub struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct LoginResponse {
    pub access: String,
    pub refresh: String,
    pub user_id: i64,
    pub username: String,
}

#[derive(Serialize)]
pub struct RegisterRequest<'a> {
    pub username: &'a str,
    pub name: &'a str,
    pub password: &'a str,
    pub password_confirm: &'a str,
}

#[derive(Serialize)]
pub struct RefreshRequest<'a> {
    pub refresh: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct RefreshResponse {
    pub access: String,
}

#[derive(Serialize)]
pub struct LogoutRequest<'a> {
    pub refresh: &'a str,
}

#[derive(Debug, Serialize)]
pub struct ChatRequest<'a> {
    pub message: &'a str,
}
