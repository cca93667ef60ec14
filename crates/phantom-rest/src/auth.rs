//! Authentication endpoints over REST.

use async_trait::async_trait;
use tracing::{debug, instrument};

use phantom_core::error::{AuthError, Error, ProtocolError};
use phantom_core::forms::{LoginForm, RegistrationForm};
use phantom_core::{AccessToken, AuthBackend, Credentials, RefreshToken, Result};

use crate::client::RestClient;
use crate::endpoints::{
    LOGIN, LOGOUT, LoginRequest, LoginResponse, LogoutRequest, REGISTER, RefreshRequest,
    RefreshResponse, RegisterRequest, TOKEN_REFRESH,
};

/// [`AuthBackend`] talking to the backend's `auth/` endpoints.
///
/// These calls bypass the request pipeline: a rejected password must not
/// trigger a token refresh.
#[derive(Debug, Clone)]
pub struct RestAuthBackend {
    client: RestClient,
}

impl RestAuthBackend {
    pub fn new(client: RestClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AuthBackend for RestAuthBackend {
    #[instrument(skip(self, form), fields(username = %form.username()))]
    async fn login(&self, form: &LoginForm) -> Result<Credentials> {
        let request = LoginRequest {
            username: form.username(),
            password: form.password(),
        };

        let response: LoginResponse = self
            .client
            .post_json(LOGIN, &request)
            .await
            .map_err(|e| match e {
                Error::Protocol(p) if p.status == 401 => {
                    Error::Auth(AuthError::InvalidCredentials(p.user_message()))
                }
                other => other,
            })?;

        debug!(user_id = response.user_id, "Login accepted");

        Ok(Credentials::new(
            AccessToken::new(response.access),
            RefreshToken::new(response.refresh),
            response.username,
            response.user_id,
        ))
    }

    #[instrument(skip(self, form), fields(username = %form.username()))]
    async fn register(&self, form: &RegistrationForm) -> Result<()> {
        let request = RegisterRequest {
            username: form.username(),
            name: form.name(),
            password: form.password(),
            password_confirm: form.password_confirm(),
        };

        self.client.post_no_response(REGISTER, &request, None).await
    }

    #[instrument(skip_all)]
    async fn refresh(&self, refresh_token: &RefreshToken) -> Result<AccessToken> {
        let request = RefreshRequest {
            refresh: refresh_token.as_str(),
        };

        let response: RefreshResponse = self.client.post_json(TOKEN_REFRESH, &request).await?;
        if response.access.is_empty() {
            return Err(Error::Protocol(ProtocolError {
                error: Some("Refresh response carried an empty access token".to_string()),
                ..ProtocolError::new(200)
            }));
        }

        Ok(AccessToken::new(response.access))
    }

    #[instrument(skip_all)]
    async fn logout(
        &self,
        refresh_token: &RefreshToken,
        access_token: Option<&AccessToken>,
    ) -> Result<()> {
        let request = LogoutRequest {
            refresh: refresh_token.as_str(),
        };

        self.client
            .post_no_response(LOGOUT, &request, access_token)
            .await
    }

    #[instrument(skip_all)]
    async fn verify(&self, access_token: &AccessToken) -> Result<bool> {
        let path = self.client.config().verify_path.clone();
        let status = self.client.get_status(&path, access_token).await?;

        match status {
            200..=299 => Ok(true),
            401 | 403 => {
                debug!(status, "Access token rejected");
                Ok(false)
            }
            other => Err(Error::Protocol(ProtocolError::new(other))),
        }
    }
}
