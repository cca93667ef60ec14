//! HTTP client for the scheduling API.

use reqwest::header::{AUTHORIZATION, HeaderName, HeaderValue};
use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, instrument, trace};

use phantom_core::error::{Error, InvalidInputError, ProtocolError, TransportError};
use phantom_core::{AccessToken, ClientConfig, Result};

use crate::pipeline::{ApiRequest, ApiResponse};

/// Map a reqwest failure onto the transport error taxonomy.
pub(crate) fn transport_error(err: reqwest::Error) -> Error {
    let transport = if err.is_timeout() {
        TransportError::Timeout
    } else if err.is_connect() {
        TransportError::Connection {
            message: err.to_string(),
        }
    } else {
        TransportError::Http {
            message: err.to_string(),
        }
    };
    Error::Transport(transport)
}

/// Low-level HTTP client.
///
/// Sends exactly what it is given: no stored tokens, no retries. The
/// refresh-aware path is [`ApiClient`](crate::ApiClient).
#[derive(Debug, Clone)]
pub struct RestClient {
    client: reqwest::Client,
    config: ClientConfig,
}

impl RestClient {
    /// Create a client for the configured API.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.timeout)
            .build()
            .map_err(transport_error)?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Send a request and read the whole response.
    ///
    /// Any status is returned as a response; only transport failures are
    /// errors.
    #[instrument(skip(self, request), fields(method = %request.method, path = %request.path))]
    pub async fn execute(&self, request: &ApiRequest) -> Result<ApiResponse> {
        let url = self.config.api_url.endpoint(&request.path);
        debug!(retried = request.retried, "Dispatching request");

        let mut builder = self.client.request(request.method.clone(), &url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(ref body) = request.body {
            builder = builder.json(body);
        }
        if let Some(ref token) = request.bearer {
            builder = builder.header(AUTHORIZATION, bearer_value(token)?);
        }
        for (name, value) in &request.headers {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                InvalidInputError::Other {
                    message: format!("invalid header name '{name}': {e}"),
                }
            })?;
            let value = HeaderValue::from_str(value).map_err(|e| InvalidInputError::Other {
                message: format!("invalid header value: {e}"),
            })?;
            builder = builder.header(name, value);
        }

        let response = builder.send().await.map_err(transport_error)?;
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(transport_error)?.to_vec();
        trace!(status, bytes = body.len(), "Response received");

        Ok(ApiResponse { status, body })
    }

    /// POST a JSON body without authentication and decode the reply.
    #[instrument(skip(self, body))]
    pub async fn post_json<B, R>(&self, path: &str, body: &B) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = self.config.api_url.endpoint(path);
        debug!(%url, "POST");

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;

        self.handle_response(response).await
    }

    /// POST a JSON body and discard the reply.
    #[instrument(skip(self, body, token))]
    pub async fn post_no_response<B>(
        &self,
        path: &str,
        body: &B,
        token: Option<&AccessToken>,
    ) -> Result<()>
    where
        B: Serialize + ?Sized,
    {
        let url = self.config.api_url.endpoint(path);
        debug!(%url, authenticated = token.is_some(), "POST (no response)");

        let mut builder = self.client.post(&url).json(body);
        if let Some(token) = token {
            builder = builder.header(AUTHORIZATION, bearer_value(token)?);
        }

        let response = builder.send().await.map_err(transport_error)?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(Error::Protocol(self.parse_error_response(response).await))
        }
    }

    /// GET with a bearer token and return only the status code.
    #[instrument(skip(self, token))]
    pub async fn get_status(&self, path: &str, token: &AccessToken) -> Result<u16> {
        let url = self.config.api_url.endpoint(path);
        debug!(%url, "GET (status only)");

        let response = self
            .client
            .get(&url)
            .header(AUTHORIZATION, bearer_value(token)?)
            .send()
            .await
            .map_err(transport_error)?;

        Ok(response.status().as_u16())
    }

    /// Handle a response, decoding the body or the error.
    async fn handle_response<R: DeserializeOwned>(&self, response: reqwest::Response) -> Result<R> {
        let status = response.status();
        trace!(status = %status, "Response");

        if status.is_success() {
            let body = response.bytes().await.map_err(transport_error)?;
            Ok(serde_json::from_slice(&body)?)
        } else {
            Err(Error::Protocol(self.parse_error_response(response).await))
        }
    }

    async fn parse_error_response(&self, response: reqwest::Response) -> ProtocolError {
        let status = response.status().as_u16();
        match response.bytes().await {
            Ok(body) => ProtocolError::from_body(status, &body),
            Err(_) => ProtocolError::new(status),
        }
    }
}

fn bearer_value(token: &AccessToken) -> Result<HeaderValue> {
    HeaderValue::from_str(&format!("Bearer {}", token.as_str())).map_err(|_| {
        Error::InvalidInput(InvalidInputError::Other {
            message: "access token contains invalid header characters".to_string(),
        })
    })
}
