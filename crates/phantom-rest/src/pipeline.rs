//! Request values and the stages applied to them before dispatch.

use std::fmt;
use std::sync::Arc;

use reqwest::Method;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::trace;

use phantom_core::{AccessToken, CredentialStoreExt, Result, TokenStore};

/// An HTTP call routed through [`ApiClient`](crate::ApiClient).
///
/// Owns everything needed to send it again, so a request that hit a 401
/// can be resubmitted with a new token.
#[derive(Clone)]
pub struct ApiRequest {
    pub method: Method,
    /// Path relative to the API base URL.
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
    /// Token to send. Set by the bearer stage or explicitly by the caller.
    pub bearer: Option<AccessToken>,
    pub headers: Vec<(String, String)>,
    /// Set once the request has been resubmitted after a refresh.
    pub retried: bool,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            bearer: None,
            headers: Vec::new(),
            retried: false,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    /// Attach a JSON body.
    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Send with this token instead of the stored one.
    pub fn bearer(mut self, token: AccessToken) -> Self {
        self.bearer = Some(token);
        self
    }
}

impl fmt::Debug for ApiRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiRequest")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("query", &self.query)
            .field("has_body", &self.body.is_some())
            .field("has_bearer", &self.bearer.is_some())
            .field("retried", &self.retried)
            .finish()
    }
}

/// A raw response with its body fully read.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Decode the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// A step applied to every outgoing request, in pipeline order.
///
/// Stages run again before a resubmission, so they must tolerate seeing a
/// request they have already processed.
pub trait RequestStage: Send + Sync {
    fn name(&self) -> &'static str;

    fn apply(&self, request: &mut ApiRequest) -> Result<()>;
}

/// Attaches the stored access token unless the request already has one.
pub struct BearerStage {
    store: Arc<dyn TokenStore>,
}

impl BearerStage {
    pub fn new(store: Arc<dyn TokenStore>) -> Self {
        Self { store }
    }
}

impl RequestStage for BearerStage {
    fn name(&self) -> &'static str {
        "bearer"
    }

    fn apply(&self, request: &mut ApiRequest) -> Result<()> {
        if request.bearer.is_some() {
            return Ok(());
        }
        request.bearer = self.store.access_token()?;
        trace!(attached = request.bearer.is_some(), "bearer stage");
        Ok(())
    }
}

/// Adds a fixed header to every request.
pub struct HeaderStage {
    name: String,
    value: String,
}

impl HeaderStage {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

impl RequestStage for HeaderStage {
    fn name(&self) -> &'static str {
        "header"
    }

    fn apply(&self, request: &mut ApiRequest) -> Result<()> {
        if !request.headers.iter().any(|(name, _)| name == &self.name) {
            request
                .headers
                .push((self.name.clone(), self.value.clone()));
        }
        Ok(())
    }
}
