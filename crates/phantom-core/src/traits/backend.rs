//! Authentication backend trait.

use async_trait::async_trait;

use crate::forms::{LoginForm, RegistrationForm};
use crate::{AccessToken, Credentials, RefreshToken, Result};

/// The backend's authentication endpoints.
///
/// Implementations talk to the server directly; they do not attach stored
/// tokens or retry on 401. The session layer decides what to do with the
/// results.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// Exchange a username and password for a full credential set.
    async fn login(&self, form: &LoginForm) -> Result<Credentials>;

    /// Create an account. Does not sign in.
    async fn register(&self, form: &RegistrationForm) -> Result<()>;

    /// Exchange a refresh token for a new access token.
    async fn refresh(&self, refresh_token: &RefreshToken) -> Result<AccessToken>;

    /// Blacklist a refresh token on the server.
    async fn logout(
        &self,
        refresh_token: &RefreshToken,
        access_token: Option<&AccessToken>,
    ) -> Result<()>;

    /// Check whether an access token is still accepted.
    ///
    /// `Ok(false)` means the server rejected the token; `Err` means the
    /// answer could not be obtained.
    async fn verify(&self, access_token: &AccessToken) -> Result<bool>;
}
