//! Client construction and session checks shared by all commands.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use directories::ProjectDirs;

use phantom_core::config::DEFAULT_API_URL;
use phantom_core::error::{AuthError, Error};
use phantom_core::{ApiUrl, ClientConfig, SessionState, User};
use phantom_file::FileTokenStore;
use phantom_rest::PhantomClient;

use crate::cli::ConnectionArgs;

/// Everything a command needs to talk to the API.
pub struct CliContext {
    client: PhantomClient,
    store_path: PathBuf,
}

/// Default token file in the platform data directory.
fn default_store_path() -> Result<PathBuf> {
    let dirs =
        ProjectDirs::from("", "", "phantom").context("Could not determine data directory")?;

    Ok(dirs.data_dir().join("tokens.json"))
}

impl CliContext {
    pub fn open(args: &ConnectionArgs) -> Result<Self> {
        let api_url = args.api_url.as_deref().unwrap_or(DEFAULT_API_URL);
        let api_url = ApiUrl::new(api_url).context("Invalid API URL")?;

        let mut config = ClientConfig::new(api_url);
        if let Some(secs) = args.timeout {
            if secs == 0 {
                bail!("Timeout must be at least one second");
            }
            config = config.with_timeout(Duration::from_secs(secs));
        }
        if let Some(ref path) = args.verify_path {
            config = config.with_verify_path(path.as_str());
        }

        let store_path = match args.store {
            Some(ref path) => path.clone(),
            None => default_store_path()?,
        };
        tracing::debug!(store = %store_path.display(), api = %config.api_url, "Opening client");

        let store = Arc::new(FileTokenStore::new(&store_path));
        let client = PhantomClient::new(config, store).context("Failed to create client")?;

        Ok(Self { client, store_path })
    }

    pub fn client(&self) -> &PhantomClient {
        &self.client
    }

    pub fn store_path(&self) -> &Path {
        &self.store_path
    }

    /// Restore the stored session, failing if nobody is signed in.
    pub async fn require_session(&self) -> Result<User> {
        match self.client.bootstrap().await {
            SessionState::Authenticated(user) => Ok(user),
            _ => bail!("Not logged in. Run 'phantom login' first."),
        }
    }
}

/// Attach a user-facing explanation to a failed API call.
///
/// A failed refresh has already cleared the session, so it gets the
/// sign-in hint instead of the generic context.
pub fn api_result<T>(result: phantom_core::Result<T>, what: &'static str) -> Result<T> {
    match result {
        Ok(value) => Ok(value),
        Err(e @ Error::Auth(AuthError::Refresh(_))) => {
            Err(anyhow::Error::new(e).context("Session expired. Run 'phantom login' again."))
        }
        Err(e) => Err(anyhow::Error::new(e).context(what)),
    }
}
