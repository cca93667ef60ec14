//! Refresh-aware request dispatch.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use phantom_core::error::{AuthError, Error, ProtocolError};
use phantom_core::{RefreshCoordinator, Result, TokenStore};

use crate::client::RestClient;
use crate::pipeline::{ApiRequest, ApiResponse, BearerStage, RequestStage};

/// The client every resource call goes through.
///
/// Each request runs through the stage pipeline (bearer attachment first)
/// and is then dispatched. A 401 hands the request to the shared
/// [`RefreshCoordinator`]; once a new token arrives the request is sent
/// again, once. Any other failure is returned untouched.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiInner>,
}

struct ApiInner {
    rest: RestClient,
    stages: Vec<Arc<dyn RequestStage>>,
    coordinator: Arc<RefreshCoordinator>,
}

impl ApiClient {
    /// Default pipeline: attach the stored access token.
    pub fn new(
        rest: RestClient,
        store: Arc<dyn TokenStore>,
        coordinator: Arc<RefreshCoordinator>,
    ) -> Self {
        Self::builder(rest, store, coordinator).build()
    }

    pub fn builder(
        rest: RestClient,
        store: Arc<dyn TokenStore>,
        coordinator: Arc<RefreshCoordinator>,
    ) -> ApiClientBuilder {
        ApiClientBuilder {
            rest,
            stages: vec![Arc::new(BearerStage::new(store))],
            coordinator,
        }
    }

    pub fn rest(&self) -> &RestClient {
        &self.inner.rest
    }

    pub fn coordinator(&self) -> &Arc<RefreshCoordinator> {
        &self.inner.coordinator
    }

    /// Names of the pipeline stages, in the order they run.
    pub fn stages(&self) -> Vec<&'static str> {
        self.inner.stages.iter().map(|stage| stage.name()).collect()
    }

    /// Send a request, refreshing the access token and retrying once on 401.
    #[instrument(skip(self, request), fields(method = %request.method, path = %request.path))]
    pub async fn send(&self, mut request: ApiRequest) -> Result<ApiResponse> {
        loop {
            for stage in &self.inner.stages {
                stage.apply(&mut request)?;
            }

            let response = self.inner.rest.execute(&request).await?;
            if response.is_success() {
                return Ok(response);
            }

            let error = ProtocolError::from_body(response.status, &response.body);
            if response.status != 401 {
                debug!(status = response.status, "Request failed");
                return Err(Error::Protocol(error));
            }

            if request.retried {
                warn!("Request rejected again after token refresh");
                return Err(Error::Protocol(error));
            }

            debug!("Access token rejected, requesting refresh");
            let token = self
                .inner
                .coordinator
                .obtain_token(request.bearer.as_ref())
                .await
                .map_err(AuthError::Refresh)?;

            info!("Resubmitting request with refreshed token");
            request.retried = true;
            request.bearer = Some(token);
        }
    }

    /// Send and decode a JSON reply.
    pub async fn send_json<T: serde::de::DeserializeOwned>(&self, request: ApiRequest) -> Result<T> {
        self.send(request).await?.json()
    }
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("api_url", &self.inner.rest.config().api_url)
            .field("stages", &self.stages())
            .finish()
    }
}

/// Builds an [`ApiClient`] with extra pipeline stages.
pub struct ApiClientBuilder {
    rest: RestClient,
    stages: Vec<Arc<dyn RequestStage>>,
    coordinator: Arc<RefreshCoordinator>,
}

impl ApiClientBuilder {
    /// Append a stage after the ones already registered.
    pub fn stage(mut self, stage: impl RequestStage + 'static) -> Self {
        self.stages.push(Arc::new(stage));
        self
    }

    pub fn build(self) -> ApiClient {
        ApiClient {
            inner: Arc::new(ApiInner {
                rest: self.rest,
                stages: self.stages,
                coordinator: self.coordinator,
            }),
        }
    }
}
