//! Session context: the authentication state machine.
//!
//! [`SessionContext`] owns the [`SessionState`] and is the only component
//! that changes it. It bootstraps from the token store, signs users in and
//! out, and hands the shared [`RefreshCoordinator`] to the HTTP layer so
//! that silent refresh and explicit session changes agree on one state.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use crate::Result;
use crate::credentials::User;
use crate::forms::{LoginForm, RegistrationForm};
use crate::refresh::{ExpiryListener, RefreshCoordinator, RefreshFailure};
use crate::state::{AuthOutcome, SessionState};
use crate::store::{CredentialStoreExt, TokenStore};
use crate::tokens::{AccessToken, RefreshToken};
use crate::traits::AuthBackend;

/// Process-wide authentication state.
///
/// Cheap to clone; clones share the same state, store and coordinator.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use phantom_core::{MemoryTokenStore, SessionContext, SessionState};
/// # use phantom_core::{AccessToken, Credentials, RefreshToken, Result};
/// # use phantom_core::forms::{LoginForm, RegistrationForm};
/// # struct Offline;
/// # #[async_trait::async_trait]
/// # impl phantom_core::AuthBackend for Offline {
/// #     async fn login(&self, _: &LoginForm) -> Result<Credentials> { unimplemented!() }
/// #     async fn register(&self, _: &RegistrationForm) -> Result<()> { unimplemented!() }
/// #     async fn refresh(&self, _: &RefreshToken) -> Result<AccessToken> { unimplemented!() }
/// #     async fn logout(&self, _: &RefreshToken, _: Option<&AccessToken>) -> Result<()> { Ok(()) }
/// #     async fn verify(&self, _: &AccessToken) -> Result<bool> { Ok(false) }
/// # }
///
/// # async fn example() {
/// let session = SessionContext::new(Arc::new(MemoryTokenStore::new()), Arc::new(Offline));
/// assert_eq!(session.state(), SessionState::Loading);
///
/// // Nothing stored, so bootstrap settles on Unauthenticated.
/// assert_eq!(session.bootstrap().await, SessionState::Unauthenticated);
/// # }
/// ```
#[derive(Clone)]
pub struct SessionContext {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    store: Arc<dyn TokenStore>,
    backend: Arc<dyn AuthBackend>,
    coordinator: Arc<RefreshCoordinator>,
    state: Arc<watch::Sender<SessionState>>,
}

/// Moves the session to `Unauthenticated` when a refresh fails for good.
struct StateExpiry(Arc<watch::Sender<SessionState>>);

impl ExpiryListener for StateExpiry {
    fn session_expired(&self, reason: &RefreshFailure) {
        info!(error = %reason, "Session expired, sign-in required");
        self.0.send_replace(SessionState::Unauthenticated);
    }
}

impl SessionContext {
    /// Create a session in the `Loading` state.
    ///
    /// Call [`bootstrap`](Self::bootstrap) once before relying on the state.
    pub fn new(store: Arc<dyn TokenStore>, backend: Arc<dyn AuthBackend>) -> Self {
        let (tx, _rx) = watch::channel(SessionState::Loading);
        let state = Arc::new(tx);

        let coordinator = RefreshCoordinator::new(store.clone(), backend.clone())
            .with_expiry_listener(Arc::new(StateExpiry(state.clone())));

        Self {
            inner: Arc::new(SessionInner {
                store,
                backend,
                coordinator: Arc::new(coordinator),
                state,
            }),
        }
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> SessionState {
        self.inner.state.borrow().clone()
    }

    /// Observe state transitions.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    /// The signed-in user, if any.
    pub fn user(&self) -> Option<User> {
        self.inner.state.borrow().user().cloned()
    }

    pub fn is_loading(&self) -> bool {
        self.inner.state.borrow().is_loading()
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.state.borrow().is_authenticated()
    }

    /// The token store backing this session.
    pub fn store(&self) -> &Arc<dyn TokenStore> {
        &self.inner.store
    }

    /// The refresh coordinator shared with the HTTP layer.
    pub fn coordinator(&self) -> &Arc<RefreshCoordinator> {
        &self.inner.coordinator
    }

    /// Resolve the stored credentials into `Authenticated` or
    /// `Unauthenticated`.
    ///
    /// Never fails: any error along the way clears the stored credentials
    /// and ends in `Unauthenticated`.
    #[instrument(skip(self))]
    pub async fn bootstrap(&self) -> SessionState {
        let next = self.resolve_stored().await;
        self.transition(next.clone());
        next
    }

    async fn resolve_stored(&self) -> SessionState {
        let credentials = match self.inner.store.load_credentials() {
            Ok(Some(credentials)) => credentials,
            Ok(None) => {
                debug!("No stored credentials");
                return SessionState::Unauthenticated;
            }
            Err(e) => {
                warn!(error = %e, "Failed to read stored credentials");
                self.clear_credentials();
                return SessionState::Unauthenticated;
            }
        };

        match self.inner.backend.verify(&credentials.access_token).await {
            Ok(true) => {
                info!(username = %credentials.username, "Stored session verified");
                SessionState::Authenticated(credentials.user())
            }
            Ok(false) => {
                debug!("Stored access token rejected, attempting refresh");
                match self
                    .inner
                    .coordinator
                    .obtain_token(Some(&credentials.access_token))
                    .await
                {
                    Ok(_) => {
                        info!(username = %credentials.username, "Stored session refreshed");
                        SessionState::Authenticated(credentials.user())
                    }
                    Err(failure) => {
                        info!(error = %failure, "Stored session could not be refreshed");
                        self.clear_credentials();
                        SessionState::Unauthenticated
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "Token verification failed, clearing stored session");
                self.clear_credentials();
                SessionState::Unauthenticated
            }
        }
    }

    /// Sign in and persist the returned credentials.
    ///
    /// On failure the state is left as it was.
    #[instrument(skip(self, password))]
    pub async fn login(&self, username: &str, password: &str) -> AuthOutcome {
        let form = LoginForm::new(username, password);
        if let Err(e) = form.validate() {
            debug!(error = %e, "Login rejected before sending");
            return AuthOutcome::failure(e.to_string());
        }

        let credentials = match self.inner.backend.login(&form).await {
            Ok(credentials) => credentials,
            Err(e) => {
                info!(error = %e, "Login failed");
                return AuthOutcome::failure(e.user_message());
            }
        };

        let saved = self
            .inner
            .coordinator
            .exclusive(|store| store.save_credentials(&credentials));
        if let Err(e) = saved {
            warn!(error = %e, "Failed to persist credentials");
            self.clear_credentials();
            return AuthOutcome::failure(e.user_message());
        }

        info!(username = %credentials.username, user_id = credentials.user_id, "Logged in");
        self.transition(SessionState::Authenticated(credentials.user()));
        AuthOutcome::success()
    }

    /// Create an account. Does not sign in or change state.
    #[instrument(skip(self, password, password_confirm))]
    pub async fn register(
        &self,
        username: &str,
        name: &str,
        password: &str,
        password_confirm: &str,
    ) -> AuthOutcome {
        let form = RegistrationForm::new(username, name, password, password_confirm);
        if let Err(e) = form.validate() {
            debug!(error = %e, "Registration rejected before sending");
            return AuthOutcome::failure(e.to_string());
        }

        match self.inner.backend.register(&form).await {
            Ok(()) => {
                info!(username = %form.username(), "Account registered");
                AuthOutcome::success()
            }
            Err(e) => {
                info!(error = %e, "Registration failed");
                AuthOutcome::failure(e.user_message())
            }
        }
    }

    /// Sign out.
    ///
    /// The server-side blacklist call is best effort. Stored credentials are
    /// always cleared and the state always ends as `Unauthenticated`.
    #[instrument(skip(self))]
    pub async fn logout(&self) {
        let refresh_token = self.inner.store.refresh_token().unwrap_or_else(|e| {
            warn!(error = %e, "Failed to read refresh token");
            None
        });
        let access_token = self.inner.store.access_token().unwrap_or_else(|e| {
            warn!(error = %e, "Failed to read access token");
            None
        });

        if let Some(refresh_token) = refresh_token {
            if let Err(e) = self.blacklist(&refresh_token, access_token).await {
                warn!(error = %e, "Failed to blacklist refresh token");
            }
        }

        self.clear_credentials();
        self.transition(SessionState::Unauthenticated);
        info!("Logged out");
    }

    /// The logout endpoint itself requires a valid access token, so an
    /// expired one is refreshed once through the coordinator first.
    async fn blacklist(
        &self,
        refresh_token: &RefreshToken,
        access_token: Option<AccessToken>,
    ) -> Result<()> {
        let backend = &self.inner.backend;
        match backend.logout(refresh_token, access_token.as_ref()).await {
            Err(e) if e.is_unauthorized() => {
                debug!("Access token rejected by logout, refreshing once");
                let token = self
                    .inner
                    .coordinator
                    .obtain_token(access_token.as_ref())
                    .await?;
                backend.logout(refresh_token, Some(&token)).await
            }
            other => other,
        }
    }

    fn clear_credentials(&self) {
        let cleared = self
            .inner
            .coordinator
            .exclusive(|store| store.clear_credentials());
        if let Err(e) = cleared {
            warn!(error = %e, "Failed to clear stored credentials");
        }
    }

    fn transition(&self, next: SessionState) {
        let previous = self.inner.state.send_replace(next);
        debug!(from = ?previous, to = ?*self.inner.state.borrow(), "Session transition");
    }
}

impl std::fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionContext")
            .field("state", &*self.inner.state.borrow())
            .field("coordinator", &self.inner.coordinator)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, ProtocolError, TransportError};
    use crate::store::{
        ACCESS_TOKEN_KEY, CREDENTIAL_KEYS, MemoryTokenStore, REFRESH_TOKEN_KEY, USER_ID_KEY,
        USERNAME_KEY,
    };
    use crate::{AccessToken, Credentials, RefreshToken, Result};
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Clone, Copy)]
    enum Verify {
        Valid,
        Invalid,
        Unreachable,
    }

    struct ScriptedBackend {
        verify: Verify,
        refresh: Option<&'static str>,
        login_ok: bool,
        register_ok: bool,
        logout_ok: bool,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedBackend {
        fn new() -> Self {
            Self {
                verify: Verify::Valid,
                refresh: Some("new"),
                login_ok: true,
                register_ok: true,
                logout_ok: true,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn record(&self, call: impl Into<String>) {
            self.calls.lock().unwrap().push(call.into());
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl AuthBackend for ScriptedBackend {
        async fn login(&self, form: &LoginForm) -> Result<Credentials> {
            self.record(format!("login:{}", form.username()));
            if self.login_ok {
                Ok(Credentials::new(
                    AccessToken::new("access-1"),
                    RefreshToken::new("refresh-1"),
                    form.username(),
                    7,
                ))
            } else {
                Err(Error::Protocol(ProtocolError::from_body(
                    401,
                    br#"{"error": "Invalid credentials"}"#,
                )))
            }
        }

        async fn register(&self, form: &RegistrationForm) -> Result<()> {
            self.record(format!("register:{}", form.username()));
            if self.register_ok {
                Ok(())
            } else {
                Err(Error::Protocol(ProtocolError::from_body(
                    400,
                    br#"{"username": ["A user with this username already exists."]}"#,
                )))
            }
        }

        async fn refresh(&self, refresh_token: &RefreshToken) -> Result<AccessToken> {
            self.record(format!("refresh:{}", refresh_token.as_str()));
            match self.refresh {
                Some(token) => Ok(AccessToken::new(token)),
                None => Err(Error::Protocol(ProtocolError::from_body(
                    401,
                    br#"{"error": "Invalid or expired refresh token"}"#,
                ))),
            }
        }

        async fn logout(
            &self,
            refresh_token: &RefreshToken,
            _access_token: Option<&AccessToken>,
        ) -> Result<()> {
            self.record(format!("logout:{}", refresh_token.as_str()));
            if self.logout_ok {
                Ok(())
            } else {
                Err(Error::Transport(TransportError::Timeout))
            }
        }

        async fn verify(&self, access_token: &AccessToken) -> Result<bool> {
            self.record(format!("verify:{}", access_token.as_str()));
            match self.verify {
                Verify::Valid => Ok(true),
                Verify::Invalid => Ok(false),
                Verify::Unreachable => Err(Error::Transport(TransportError::Connection {
                    message: "connection refused".to_string(),
                })),
            }
        }
    }

    fn stored(access: &str, refresh: &str) -> Arc<MemoryTokenStore> {
        Arc::new(MemoryTokenStore::with_entries([
            (ACCESS_TOKEN_KEY, access),
            (REFRESH_TOKEN_KEY, refresh),
            (USERNAME_KEY, "alice"),
            (USER_ID_KEY, "7"),
        ]))
    }

    fn alice() -> User {
        User {
            username: "alice".to_string(),
            user_id: 7,
        }
    }

    fn assert_cleared(store: &MemoryTokenStore) {
        for key in CREDENTIAL_KEYS {
            assert_eq!(store.get(key).unwrap(), None, "{key} should be removed");
        }
    }

    #[tokio::test]
    async fn bootstrap_without_credentials_is_unauthenticated() {
        let backend = Arc::new(ScriptedBackend::new());
        let session = SessionContext::new(Arc::new(MemoryTokenStore::new()), backend.clone());

        assert!(session.is_loading());
        assert_eq!(session.bootstrap().await, SessionState::Unauthenticated);
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn bootstrap_with_partial_credentials_skips_verify() {
        let store = stored("access", "refresh");
        store.remove(USERNAME_KEY).unwrap();
        let backend = Arc::new(ScriptedBackend::new());
        let session = SessionContext::new(store, backend.clone());

        assert_eq!(session.bootstrap().await, SessionState::Unauthenticated);
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn bootstrap_with_valid_token() {
        let backend = Arc::new(ScriptedBackend::new());
        let session = SessionContext::new(stored("good", "refresh"), backend.clone());

        assert_eq!(
            session.bootstrap().await,
            SessionState::Authenticated(alice())
        );
        assert_eq!(backend.calls(), vec!["verify:good"]);
    }

    #[tokio::test]
    async fn bootstrap_is_idempotent() {
        let backend = Arc::new(ScriptedBackend::new());
        let session = SessionContext::new(stored("good", "refresh"), backend);

        let first = session.bootstrap().await;
        let second = session.bootstrap().await;
        assert_eq!(first, second);
        assert_eq!(second, SessionState::Authenticated(alice()));
    }

    #[tokio::test]
    async fn bootstrap_refreshes_rejected_token() {
        let store = stored("bad", "good");
        let backend = Arc::new(ScriptedBackend {
            verify: Verify::Invalid,
            ..ScriptedBackend::new()
        });
        let session = SessionContext::new(store.clone(), backend.clone());

        assert_eq!(
            session.bootstrap().await,
            SessionState::Authenticated(alice())
        );
        assert_eq!(store.get(ACCESS_TOKEN_KEY).unwrap().as_deref(), Some("new"));
        assert_eq!(store.get(REFRESH_TOKEN_KEY).unwrap().as_deref(), Some("good"));
        assert_eq!(backend.calls(), vec!["verify:bad", "refresh:good"]);
    }

    #[tokio::test]
    async fn bootstrap_with_both_tokens_invalid_clears_everything() {
        let store = stored("bad", "bad");
        let backend = Arc::new(ScriptedBackend {
            verify: Verify::Invalid,
            refresh: None,
            ..ScriptedBackend::new()
        });
        let session = SessionContext::new(store.clone(), backend);

        assert_eq!(session.bootstrap().await, SessionState::Unauthenticated);
        assert_cleared(&store);
    }

    #[tokio::test]
    async fn bootstrap_verify_error_clears_everything() {
        let store = stored("good", "good");
        let backend = Arc::new(ScriptedBackend {
            verify: Verify::Unreachable,
            ..ScriptedBackend::new()
        });
        let session = SessionContext::new(store.clone(), backend.clone());

        assert_eq!(session.bootstrap().await, SessionState::Unauthenticated);
        assert_cleared(&store);
        assert_eq!(backend.calls(), vec!["verify:good"]);
    }

    #[tokio::test]
    async fn login_then_logout_round_trip() {
        let store = Arc::new(MemoryTokenStore::new());
        let backend = Arc::new(ScriptedBackend::new());
        let session = SessionContext::new(store.clone(), backend.clone());
        session.bootstrap().await;

        let outcome = session.login("alice", "correct-horse").await;
        assert_eq!(outcome, AuthOutcome::success());
        assert_eq!(session.state(), SessionState::Authenticated(alice()));
        assert_eq!(store.len(), 4);
        assert_eq!(
            store.get(ACCESS_TOKEN_KEY).unwrap().as_deref(),
            Some("access-1")
        );
        assert_eq!(
            store.get(REFRESH_TOKEN_KEY).unwrap().as_deref(),
            Some("refresh-1")
        );
        assert_eq!(store.get(USER_ID_KEY).unwrap().as_deref(), Some("7"));

        session.logout().await;
        assert_eq!(session.state(), SessionState::Unauthenticated);
        assert_cleared(&store);
        assert_eq!(
            backend.calls(),
            vec!["login:alice", "logout:refresh-1"]
        );
    }

    #[tokio::test]
    async fn login_failure_leaves_state_untouched() {
        let store = Arc::new(MemoryTokenStore::new());
        let backend = Arc::new(ScriptedBackend {
            login_ok: false,
            ..ScriptedBackend::new()
        });
        let session = SessionContext::new(store.clone(), backend);
        session.bootstrap().await;

        let outcome = session.login("alice", "wrong").await;
        assert_eq!(outcome, AuthOutcome::failure("Invalid credentials"));
        assert_eq!(session.state(), SessionState::Unauthenticated);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn login_validation_never_reaches_backend() {
        let backend = Arc::new(ScriptedBackend::new());
        let session = SessionContext::new(Arc::new(MemoryTokenStore::new()), backend.clone());

        let outcome = session.login("", "pw").await;
        assert!(!outcome.success);
        assert_eq!(outcome.error.as_deref(), Some("Username is required"));
        assert!(backend.calls().is_empty());
        assert!(session.is_loading());
    }

    #[tokio::test]
    async fn logout_clears_even_when_backend_fails() {
        let store = stored("good", "good");
        let backend = Arc::new(ScriptedBackend {
            logout_ok: false,
            ..ScriptedBackend::new()
        });
        let session = SessionContext::new(store.clone(), backend.clone());
        session.bootstrap().await;

        session.logout().await;
        assert_eq!(session.state(), SessionState::Unauthenticated);
        assert_cleared(&store);
        assert!(backend.calls().contains(&"logout:good".to_string()));
    }

    #[tokio::test]
    async fn register_does_not_change_state() {
        let backend = Arc::new(ScriptedBackend::new());
        let session = SessionContext::new(Arc::new(MemoryTokenStore::new()), backend.clone());
        session.bootstrap().await;

        let outcome = session
            .register("bob", "Bob", "correct-horse", "correct-horse")
            .await;
        assert_eq!(outcome, AuthOutcome::success());
        assert_eq!(session.state(), SessionState::Unauthenticated);
        assert_eq!(backend.calls(), vec!["register:bob"]);
    }

    #[tokio::test]
    async fn register_surfaces_backend_messages() {
        let backend = Arc::new(ScriptedBackend {
            register_ok: false,
            ..ScriptedBackend::new()
        });
        let session = SessionContext::new(Arc::new(MemoryTokenStore::new()), backend);

        let outcome = session
            .register("bob", "Bob", "correct-horse", "correct-horse")
            .await;
        assert_eq!(
            outcome.error.as_deref(),
            Some("username: A user with this username already exists.")
        );
    }

    #[tokio::test]
    async fn register_mismatch_is_local() {
        let backend = Arc::new(ScriptedBackend::new());
        let session = SessionContext::new(Arc::new(MemoryTokenStore::new()), backend.clone());

        let outcome = session
            .register("bob", "Bob", "correct-horse", "battery-staple")
            .await;
        assert_eq!(outcome.error.as_deref(), Some("Passwords do not match"));
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn failed_silent_refresh_signs_the_user_out() {
        let store = stored("good", "revoked");
        let backend = Arc::new(ScriptedBackend {
            refresh: None,
            ..ScriptedBackend::new()
        });
        let session = SessionContext::new(store.clone(), backend);
        let mut updates = session.subscribe();

        assert!(session.bootstrap().await.is_authenticated());
        updates.borrow_and_update();

        // What the HTTP layer does after a 401 on an ordinary request.
        let result = session
            .coordinator()
            .obtain_token(Some(&AccessToken::new("good")))
            .await;
        assert!(result.is_err());

        updates.changed().await.unwrap();
        assert_eq!(*updates.borrow(), SessionState::Unauthenticated);
        assert_cleared(&store);
    }
}
