//! Error types for the phantom client.
//!
//! One unified error type with explicit variants for transport,
//! authentication, protocol, input validation, storage and decoding
//! failures, so callers can handle specific cases.

use std::collections::BTreeMap;
use std::fmt;

use serde::Deserialize;
use thiserror::Error;

use crate::refresh::RefreshFailure;

/// The unified error type for phantom operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Network transport errors (DNS, TLS, connection, timeout).
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Authentication errors (bad credentials, failed refresh).
    #[error("authentication error: {0}")]
    Auth(#[from] AuthError),

    /// Non-success responses from the backend.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Input rejected before any request was made.
    #[error("invalid input: {0}")]
    InvalidInput(#[from] InvalidInputError),

    /// Token store failures.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// A success response whose body did not match the expected shape.
    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),
}

impl Error {
    /// Returns true if this is a 401 from the backend.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Error::Protocol(p) if p.status == 401)
    }

    /// A message suitable for showing to the person using the client.
    ///
    /// Backend validation messages are passed through verbatim.
    pub fn user_message(&self) -> String {
        match self {
            Error::Protocol(p) => p.user_message(),
            Error::InvalidInput(e) => e.to_string(),
            Error::Auth(AuthError::InvalidCredentials(message)) => message.clone(),
            Error::Transport(_) => {
                "Unable to reach the server. Check your connection and try again.".to_string()
            }
            other => other.to_string(),
        }
    }
}

/// Transport-level errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Network connection failed.
    #[error("connection failed: {message}")]
    Connection { message: String },

    /// Request timed out.
    #[error("request timed out")]
    Timeout,

    /// Generic HTTP error.
    #[error("HTTP error: {message}")]
    Http { message: String },
}

/// Authentication-related errors.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The backend rejected the username/password pair.
    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    /// No usable credentials are stored.
    #[error("not authenticated")]
    NotAuthenticated,

    /// The access token could not be renewed.
    #[error("token refresh failed: {0}")]
    Refresh(#[from] RefreshFailure),
}

/// A non-success response from the backend.
///
/// The backend reports errors in a few shapes: `{"error": ...}`,
/// `{"message": ...}`, `{"detail": ...}`, or a map of field names to
/// lists of validation messages. All of them are kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolError {
    /// HTTP status code.
    pub status: u16,
    /// `error` field, if present.
    pub error: Option<String>,
    /// `message` or `detail` field, if present.
    pub message: Option<String>,
    /// Field-level validation messages.
    pub fields: BTreeMap<String, Vec<String>>,
}

impl ProtocolError {
    /// Create a protocol error with no body details.
    pub fn new(status: u16) -> Self {
        Self {
            status,
            error: None,
            message: None,
            fields: BTreeMap::new(),
        }
    }

    /// Build a protocol error from a raw response body.
    ///
    /// Bodies that are not JSON objects are ignored.
    pub fn from_body(status: u16, body: &[u8]) -> Self {
        let mut error = Self::new(status);

        let Ok(ErrorBody(map)) = serde_json::from_slice::<ErrorBody>(body) else {
            return error;
        };

        for (key, value) in map {
            match (key.as_str(), value) {
                ("error", serde_json::Value::String(s)) => error.error = Some(s),
                ("message" | "detail", serde_json::Value::String(s)) => {
                    if error.message.is_none() {
                        error.message = Some(s);
                    }
                }
                (_, serde_json::Value::String(s)) => {
                    error.fields.insert(key, vec![s]);
                }
                (_, serde_json::Value::Array(items)) => {
                    let messages: Vec<String> = items
                        .into_iter()
                        .filter_map(|item| match item {
                            serde_json::Value::String(s) => Some(s),
                            _ => None,
                        })
                        .collect();
                    if !messages.is_empty() {
                        error.fields.insert(key, messages);
                    }
                }
                _ => {}
            }
        }

        error
    }

    /// Check if this is an authentication error.
    pub fn is_auth_error(&self) -> bool {
        self.status == 401
    }

    /// The most specific human-readable message available.
    pub fn user_message(&self) -> String {
        if let Some(ref error) = self.error {
            return error.clone();
        }
        if let Some(ref message) = self.message {
            return message.clone();
        }
        if !self.fields.is_empty() {
            return self
                .fields
                .iter()
                .map(|(field, messages)| {
                    if field == "non_field_errors" {
                        messages.join(" ")
                    } else {
                        format!("{}: {}", field, messages.join(" "))
                    }
                })
                .collect::<Vec<_>>()
                .join("\n");
        }
        format!("Request failed with status {}", self.status)
    }
}

#[derive(Deserialize)]
struct ErrorBody(serde_json::Map<String, serde_json::Value>);

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HTTP {}", self.status)?;
        if let Some(ref error) = self.error {
            write!(f, " [{}]", error)?;
        }
        if let Some(ref message) = self.message {
            write!(f, ": {}", message)?;
        }
        for (field, messages) in &self.fields {
            write!(f, " {}={:?}", field, messages)?;
        }
        Ok(())
    }
}

impl std::error::Error for ProtocolError {}

/// Input validation errors, raised before any network call.
#[derive(Debug, Error)]
pub enum InvalidInputError {
    /// Invalid API base URL.
    #[error("invalid API URL '{value}': {reason}")]
    ApiUrl { value: String, reason: String },

    /// A required field was left empty.
    #[error("{field} is required")]
    Missing { field: &'static str },

    /// Username does not meet the backend's rules.
    #[error("{reason}")]
    Username { reason: String },

    /// Password does not meet the minimum requirements.
    #[error("{reason}")]
    Password { reason: String },

    /// Password and confirmation differ.
    #[error("Passwords do not match")]
    PasswordMismatch,

    /// Generic invalid input.
    #[error("{message}")]
    Other { message: String },
}

/// Token store errors.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Underlying I/O failure.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The stored data could not be parsed.
    #[error("corrupt token store at {path}: {message}")]
    Corrupt { path: String, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_error_field() {
        let err = ProtocolError::from_body(401, br#"{"error": "Invalid credentials"}"#);
        assert_eq!(err.error.as_deref(), Some("Invalid credentials"));
        assert_eq!(err.user_message(), "Invalid credentials");
    }

    #[test]
    fn parses_detail_as_message() {
        let err = ProtocolError::from_body(
            401,
            br#"{"detail": "Given token not valid for any token type", "code": "token_not_valid"}"#,
        );
        assert_eq!(
            err.message.as_deref(),
            Some("Given token not valid for any token type")
        );
        assert!(err.is_auth_error());
    }

    #[test]
    fn collects_field_validation_messages() {
        let err = ProtocolError::from_body(
            400,
            br#"{"username": ["A user with this username already exists."],
                 "password": ["This password is too short.", "This password is too common."]}"#,
        );
        assert_eq!(err.fields.len(), 2);
        let message = err.user_message();
        assert!(message.contains("username: A user with this username already exists."));
        assert!(message.contains("This password is too common."));
    }

    #[test]
    fn non_json_body_keeps_status() {
        let err = ProtocolError::from_body(502, b"<html>Bad Gateway</html>");
        assert_eq!(err.status, 502);
        assert_eq!(err.user_message(), "Request failed with status 502");
    }

    #[test]
    fn unauthorized_detection() {
        let err = Error::Protocol(ProtocolError::new(401));
        assert!(err.is_unauthorized());
        let err = Error::Protocol(ProtocolError::new(403));
        assert!(!err.is_unauthorized());
    }
}
