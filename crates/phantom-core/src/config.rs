//! Client configuration.

use std::time::Duration;

use crate::Result;
use crate::error::InvalidInputError;
use crate::types::ApiUrl;

/// Base URL used when nothing else is configured.
pub const DEFAULT_API_URL: &str = "http://localhost:8000/api/";

/// Authenticated GET used to check a stored access token, relative to the
/// base URL. The backend has no dedicated verify route, so any cheap
/// endpoint that answers 401/403 to a bad token serves.
pub const DEFAULT_VERIFY_PATH: &str = "preferences/";

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Environment variable names read by [`ClientConfig::from_env`].
pub const ENV_API_URL: &str = "PHANTOM_API_URL";
pub const ENV_TIMEOUT_SECS: &str = "PHANTOM_TIMEOUT_SECS";
pub const ENV_VERIFY_PATH: &str = "PHANTOM_VERIFY_PATH";

/// Settings shared by every HTTP call the client makes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub api_url: ApiUrl,
    pub timeout: Duration,
    pub verify_path: String,
    pub user_agent: String,
}

impl ClientConfig {
    /// Configuration for `api_url` with default settings.
    pub fn new(api_url: ApiUrl) -> Self {
        Self {
            api_url,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            verify_path: DEFAULT_VERIFY_PATH.to_string(),
            user_agent: concat!("phantom/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }

    /// Build configuration from environment variables.
    ///
    /// Optional:
    /// - `PHANTOM_API_URL`: default `http://localhost:8000/api/`
    /// - `PHANTOM_TIMEOUT_SECS`: default 30
    /// - `PHANTOM_VERIFY_PATH`: default `preferences/`
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let api_url = match lookup(ENV_API_URL) {
            Some(raw) => ApiUrl::new(raw.trim())?,
            None => ApiUrl::new(DEFAULT_API_URL)?,
        };

        let mut config = Self::new(api_url);

        if let Some(raw) = lookup(ENV_TIMEOUT_SECS) {
            let secs = raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .ok_or_else(|| InvalidInputError::Other {
                    message: format!("{ENV_TIMEOUT_SECS} must be a positive integer, got '{raw}'"),
                })?;
            config.timeout = Duration::from_secs(secs);
        }

        if let Some(path) = lookup(ENV_VERIFY_PATH) {
            config = config.with_verify_path(path);
        }

        Ok(config)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_verify_path(mut self, path: impl Into<String>) -> Self {
        self.verify_path = path.into().trim_start_matches('/').to_string();
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}
