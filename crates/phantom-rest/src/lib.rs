//! phantom-rest - REST transport for the Phantom scheduling client.
//!
//! [`PhantomClient`] wires the pieces together: one token store, one
//! [`SessionContext`], and an [`ApiClient`] that shares the session's
//! refresh coordinator, so a failed silent refresh signs the session out.

mod api;
mod auth;
mod client;
pub mod endpoints;
mod pipeline;
mod resources;

use std::sync::Arc;

use phantom_core::{AuthOutcome, ClientConfig, Result, SessionContext, SessionState, TokenStore};

pub use api::{ApiClient, ApiClientBuilder};
pub use auth::RestAuthBackend;
pub use client::RestClient;
pub use pipeline::{ApiRequest, ApiResponse, BearerStage, HeaderStage, RequestStage};

/// Session plus API access against one backend.
#[derive(Debug, Clone)]
pub struct PhantomClient {
    session: SessionContext,
    api: ApiClient,
}

impl PhantomClient {
    /// Build a client with the default request pipeline.
    pub fn new(config: ClientConfig, store: Arc<dyn TokenStore>) -> Result<Self> {
        Self::with_stages(config, store, |builder| builder)
    }

    /// Build a client, letting `configure` add request stages.
    pub fn with_stages(
        config: ClientConfig,
        store: Arc<dyn TokenStore>,
        configure: impl FnOnce(ApiClientBuilder) -> ApiClientBuilder,
    ) -> Result<Self> {
        let rest = RestClient::new(config)?;
        let backend = Arc::new(RestAuthBackend::new(rest.clone()));
        let session = SessionContext::new(store.clone(), backend);
        let builder = ApiClient::builder(rest, store, session.coordinator().clone());
        let api = configure(builder).build();

        Ok(Self { session, api })
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    pub async fn bootstrap(&self) -> SessionState {
        self.session.bootstrap().await
    }

    pub async fn login(&self, username: &str, password: &str) -> AuthOutcome {
        self.session.login(username, password).await
    }

    pub async fn register(
        &self,
        username: &str,
        name: &str,
        password: &str,
        password_confirm: &str,
    ) -> AuthOutcome {
        self.session
            .register(username, name, password, password_confirm)
            .await
    }

    pub async fn logout(&self) {
        self.session.logout().await
    }
}
