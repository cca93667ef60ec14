//! phantom-core - Session, token and model types for the Phantom scheduling
//! client.
//!
//! The pieces that decide who is signed in live here: the [`TokenStore`]
//! abstraction, the [`RefreshCoordinator`] that keeps token refresh
//! single-flight, and the [`SessionContext`] state machine. Transport lives
//! in `phantom-rest`; durable storage in `phantom-file`.

pub mod config;
pub mod credentials;
pub mod error;
pub mod forms;
pub mod models;
pub mod refresh;
pub mod session;
pub mod state;
pub mod store;
pub mod tokens;
pub mod traits;
pub mod types;

pub use config::ClientConfig;
pub use credentials::{Credentials, User};
pub use error::Error;
pub use forms::{LoginForm, RegistrationForm};
pub use refresh::{ExpiryListener, RefreshCoordinator, RefreshFailure};
pub use session::SessionContext;
pub use state::{AuthOutcome, SessionState};
pub use store::{CredentialStoreExt, MemoryTokenStore, TokenStore};
pub use tokens::{AccessToken, RefreshToken};
pub use traits::AuthBackend;
pub use types::ApiUrl;

/// Result type alias using the crate's Error type.
pub type Result<T> = std::result::Result<T, Error>;
