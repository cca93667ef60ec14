//! Single-flight access token refresh.
//!
//! When several requests hit a 401 at once, only the first one exchanges the
//! refresh token. The others wait in a FIFO queue and are released together
//! with the same outcome once that exchange settles.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{debug, info, instrument, warn};

use crate::error::{AuthError, Error};
use crate::store::{CredentialStoreExt, TokenStore};
use crate::traits::AuthBackend;
use crate::tokens::{AccessToken, RefreshToken};

/// Why a refresh did not produce a new access token.
///
/// Cloneable so one failure can be handed to every queued request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RefreshFailure {
    /// No refresh token is stored.
    #[error("no refresh token stored")]
    MissingRefreshToken,

    /// The backend refused the refresh token.
    #[error("refresh rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },

    /// The refresh request never got a response.
    #[error("refresh request failed: {0}")]
    Transport(String),

    /// The refresh response could not be understood.
    #[error("invalid refresh response: {0}")]
    InvalidResponse(String),

    /// Reading or writing the token store failed.
    #[error("token store failed: {0}")]
    Storage(String),

    /// The task driving the refresh was dropped before it finished.
    #[error("refresh abandoned before completion")]
    Abandoned,

    /// The stored session was signed out or replaced while the refresh was
    /// in flight. Its result was discarded.
    #[error("session changed during refresh")]
    Superseded,
}

impl From<Error> for RefreshFailure {
    fn from(err: Error) -> Self {
        match err {
            Error::Protocol(p) => RefreshFailure::Rejected {
                status: p.status,
                message: p.user_message(),
            },
            Error::Transport(t) => RefreshFailure::Transport(t.to_string()),
            Error::Storage(s) => RefreshFailure::Storage(s.to_string()),
            Error::Auth(AuthError::Refresh(failure)) => failure,
            other => RefreshFailure::InvalidResponse(other.to_string()),
        }
    }
}

impl From<RefreshFailure> for Error {
    fn from(failure: RefreshFailure) -> Self {
        Error::Auth(AuthError::Refresh(failure))
    }
}

/// Notified when the session can no longer be renewed and the user has to
/// sign in again.
pub trait ExpiryListener: Send + Sync {
    fn session_expired(&self, reason: &RefreshFailure);
}

type Waiter = oneshot::Sender<Result<AccessToken, RefreshFailure>>;

#[derive(Default)]
struct RefreshState {
    refreshing: bool,
    queue: VecDeque<Waiter>,
}

enum Entry {
    Queued(oneshot::Receiver<Result<AccessToken, RefreshFailure>>),
    Current(AccessToken),
    Lead(RefreshToken),
    Failed(RefreshFailure),
}

/// Collapses concurrent refresh attempts into one exchange.
pub struct RefreshCoordinator {
    store: Arc<dyn TokenStore>,
    backend: Arc<dyn AuthBackend>,
    listener: Option<Arc<dyn ExpiryListener>>,
    state: Mutex<RefreshState>,
    exchanges: AtomicUsize,
}

impl RefreshCoordinator {
    pub fn new(store: Arc<dyn TokenStore>, backend: Arc<dyn AuthBackend>) -> Self {
        Self {
            store,
            backend,
            listener: None,
            state: Mutex::new(RefreshState::default()),
            exchanges: AtomicUsize::new(0),
        }
    }

    /// Register the listener told about unrecoverable refresh failures.
    pub fn with_expiry_listener(mut self, listener: Arc<dyn ExpiryListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Get a usable access token after a request was rejected with 401.
    ///
    /// `stale` is the token the rejected request carried. If the stored
    /// token already differs from it, a refresh has completed since the
    /// request was sent and the stored token is returned directly.
    ///
    /// On failure the stored credentials are cleared and the expiry
    /// listener is notified.
    #[instrument(skip_all)]
    pub async fn obtain_token(
        &self,
        stale: Option<&AccessToken>,
    ) -> Result<AccessToken, RefreshFailure> {
        match self.enter(stale) {
            Entry::Queued(rx) => {
                debug!("Refresh in flight, queueing request");
                rx.await.unwrap_or(Err(RefreshFailure::Abandoned))
            }
            Entry::Current(token) => {
                debug!("Access token already refreshed");
                Ok(token)
            }
            Entry::Failed(failure) => {
                self.expire(&failure);
                Err(failure)
            }
            Entry::Lead(refresh_token) => self.lead(refresh_token).await,
        }
    }

    /// True while a refresh exchange is outstanding.
    pub fn is_refreshing(&self) -> bool {
        self.lock().refreshing
    }

    /// Number of requests waiting on the current refresh.
    pub fn queued(&self) -> usize {
        self.lock().queue.len()
    }

    /// Number of refresh exchanges started so far.
    pub fn exchanges(&self) -> usize {
        self.exchanges.load(Ordering::Relaxed)
    }

    fn lock(&self) -> MutexGuard<'_, RefreshState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // The flag check, the stored-token reads and the enqueue happen under
    // one lock, so the queue is empty whenever this returns `Failed`.
    fn enter(&self, stale: Option<&AccessToken>) -> Entry {
        let mut state = self.lock();

        if state.refreshing {
            let (tx, rx) = oneshot::channel();
            state.queue.push_back(tx);
            return Entry::Queued(rx);
        }

        match self.store.access_token() {
            Ok(Some(current)) if stale != Some(&current) => return Entry::Current(current),
            Ok(_) => {}
            Err(e) => return Entry::Failed(RefreshFailure::Storage(e.to_string())),
        }

        match self.store.refresh_token() {
            Ok(Some(token)) => {
                state.refreshing = true;
                Entry::Lead(token)
            }
            Ok(None) => Entry::Failed(RefreshFailure::MissingRefreshToken),
            Err(e) => Entry::Failed(RefreshFailure::Storage(e.to_string())),
        }
    }

    async fn lead(&self, refresh_token: RefreshToken) -> Result<AccessToken, RefreshFailure> {
        let flight = InFlight {
            coordinator: self,
            settled: false,
        };

        let exchange = self.exchanges.fetch_add(1, Ordering::Relaxed) + 1;
        info!(exchange, "Refreshing access token");

        let exchanged = self.backend.refresh(&refresh_token).await;
        let outcome = self.commit(&refresh_token, exchanged);

        match &outcome {
            Ok(_) => info!(exchange, "Access token refreshed"),
            Err(RefreshFailure::Superseded) => {
                info!(exchange, "Session changed during refresh, result discarded")
            }
            Err(_) => {}
        }

        flight.settle(outcome.clone());
        outcome
    }

    /// Apply the exchange result, unless the session it started from is gone.
    ///
    /// Runs under the state lock, as do [`exclusive`](Self::exclusive)
    /// callers, so a logout or login cannot interleave with the check and
    /// the write.
    fn commit(
        &self,
        refresh_token: &RefreshToken,
        exchanged: Result<AccessToken, Error>,
    ) -> Result<AccessToken, RefreshFailure> {
        let _state = self.lock();

        let failure = match self.store.refresh_token() {
            Ok(Some(ref current)) if current == refresh_token => match exchanged {
                Ok(token) => match self.store.set_access_token(&token) {
                    Ok(()) => return Ok(token),
                    Err(e) => RefreshFailure::Storage(e.to_string()),
                },
                Err(e) => RefreshFailure::from(e),
            },
            Ok(_) => return Err(RefreshFailure::Superseded),
            Err(e) => RefreshFailure::Storage(e.to_string()),
        };

        self.expire(&failure);
        Err(failure)
    }

    /// Run a credential store mutation that must not interleave with a
    /// refresh committing its result.
    pub fn exclusive<R>(&self, f: impl FnOnce(&dyn TokenStore) -> R) -> R {
        let _state = self.lock();
        f(self.store.as_ref())
    }

    fn expire(&self, reason: &RefreshFailure) {
        warn!(error = %reason, "Session can no longer be refreshed, clearing credentials");
        if let Err(e) = self.store.clear_credentials() {
            warn!(error = %e, "Failed to clear credentials");
        }
        if let Some(listener) = &self.listener {
            listener.session_expired(reason);
        }
    }

    fn release(&self, outcome: Result<AccessToken, RefreshFailure>) {
        let waiters = {
            let mut state = self.lock();
            state.refreshing = false;
            std::mem::take(&mut state.queue)
        };

        debug!(
            waiters = waiters.len(),
            success = outcome.is_ok(),
            "Releasing queued requests"
        );

        for waiter in waiters {
            // A dropped receiver means that caller went away.
            let _ = waiter.send(outcome.clone());
        }
    }
}

impl std::fmt::Debug for RefreshCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("RefreshCoordinator")
            .field("refreshing", &state.refreshing)
            .field("queued", &state.queue.len())
            .field("exchanges", &self.exchanges())
            .finish()
    }
}

/// Releases the queue when the leading request finishes or is dropped.
struct InFlight<'a> {
    coordinator: &'a RefreshCoordinator,
    settled: bool,
}

impl InFlight<'_> {
    fn settle(mut self, outcome: Result<AccessToken, RefreshFailure>) {
        self.settled = true;
        self.coordinator.release(outcome);
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.coordinator.release(Err(RefreshFailure::Abandoned));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProtocolError;
    use crate::forms::{LoginForm, RegistrationForm};
    use crate::store::{
        ACCESS_TOKEN_KEY, MemoryTokenStore, REFRESH_TOKEN_KEY, USER_ID_KEY, USERNAME_KEY,
    };
    use crate::{Credentials, Result};
    use async_trait::async_trait;
    use std::time::Duration;
    use tokio::sync::Notify;

    /// Backend whose refresh blocks until the test opens the gate.
    struct GatedBackend {
        gate: Notify,
        calls: AtomicUsize,
        reply: std::result::Result<&'static str, u16>,
    }

    impl GatedBackend {
        fn new(reply: std::result::Result<&'static str, u16>) -> Arc<Self> {
            Arc::new(Self {
                gate: Notify::new(),
                calls: AtomicUsize::new(0),
                reply,
            })
        }
    }

    #[async_trait]
    impl AuthBackend for GatedBackend {
        async fn login(&self, _form: &LoginForm) -> Result<Credentials> {
            unreachable!("login not used")
        }

        async fn register(&self, _form: &RegistrationForm) -> Result<()> {
            unreachable!("register not used")
        }

        async fn refresh(&self, refresh_token: &RefreshToken) -> Result<AccessToken> {
            assert_eq!(refresh_token.as_str(), "good-refresh");
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.gate.notified().await;
            match self.reply {
                Ok(token) => Ok(AccessToken::new(token)),
                Err(status) => Err(Error::Protocol(ProtocolError::new(status))),
            }
        }

        async fn logout(
            &self,
            _refresh_token: &RefreshToken,
            _access_token: Option<&AccessToken>,
        ) -> Result<()> {
            Ok(())
        }

        async fn verify(&self, _access_token: &AccessToken) -> Result<bool> {
            Ok(true)
        }
    }

    #[derive(Default)]
    struct CountingListener(AtomicUsize);

    impl ExpiryListener for CountingListener {
        fn session_expired(&self, _reason: &RefreshFailure) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn seeded_store() -> Arc<MemoryTokenStore> {
        Arc::new(MemoryTokenStore::with_entries([
            (ACCESS_TOKEN_KEY, "old-access"),
            (REFRESH_TOKEN_KEY, "good-refresh"),
            (USERNAME_KEY, "alice"),
            (USER_ID_KEY, "7"),
        ]))
    }

    async fn wait_for_queue(coordinator: &RefreshCoordinator, expected: usize) {
        for _ in 0..1000 {
            if coordinator.queued() == expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        panic!("queue never reached {expected}");
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_exchange() {
        let store = seeded_store();
        let backend = GatedBackend::new(Ok("new-access"));
        let coordinator = Arc::new(RefreshCoordinator::new(store.clone(), backend.clone()));
        let stale = AccessToken::new("old-access");

        let mut handles = Vec::new();
        for _ in 0..3 {
            let coordinator = coordinator.clone();
            let stale = stale.clone();
            handles.push(tokio::spawn(async move {
                coordinator.obtain_token(Some(&stale)).await
            }));
        }

        // One leads the exchange, the other two queue behind it.
        wait_for_queue(&coordinator, 2).await;
        assert!(coordinator.is_refreshing());
        backend.gate.notify_one();

        for handle in handles {
            let token = handle.await.unwrap().unwrap();
            assert_eq!(token.as_str(), "new-access");
        }

        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
        assert_eq!(coordinator.exchanges(), 1);
        assert!(!coordinator.is_refreshing());
        assert_eq!(coordinator.queued(), 0);
        assert_eq!(
            store.get(ACCESS_TOKEN_KEY).unwrap().as_deref(),
            Some("new-access")
        );
        assert_eq!(store.get(USERNAME_KEY).unwrap().as_deref(), Some("alice"));
    }

    #[tokio::test]
    async fn failure_rejects_every_waiter_and_clears_store() {
        let store = seeded_store();
        let backend = GatedBackend::new(Err(401));
        let listener = Arc::new(CountingListener::default());
        let coordinator = Arc::new(
            RefreshCoordinator::new(store.clone(), backend.clone())
                .with_expiry_listener(listener.clone()),
        );
        let stale = AccessToken::new("old-access");

        let mut handles = Vec::new();
        for _ in 0..3 {
            let coordinator = coordinator.clone();
            let stale = stale.clone();
            handles.push(tokio::spawn(async move {
                coordinator.obtain_token(Some(&stale)).await
            }));
        }

        wait_for_queue(&coordinator, 2).await;
        backend.gate.notify_one();

        for handle in handles {
            let err = handle.await.unwrap().unwrap_err();
            assert!(matches!(err, RefreshFailure::Rejected { status: 401, .. }));
        }

        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
        assert_eq!(listener.0.load(Ordering::SeqCst), 1);
        assert!(store.is_empty());
        assert!(!coordinator.is_refreshing());
    }

    #[tokio::test]
    async fn missing_refresh_token_fails_without_exchange() {
        let store = seeded_store();
        store.remove(REFRESH_TOKEN_KEY).unwrap();
        let backend = GatedBackend::new(Ok("unused"));
        let listener = Arc::new(CountingListener::default());
        let coordinator = RefreshCoordinator::new(store.clone(), backend.clone())
            .with_expiry_listener(listener.clone());

        let err = coordinator
            .obtain_token(Some(&AccessToken::new("old-access")))
            .await
            .unwrap_err();

        assert_eq!(err, RefreshFailure::MissingRefreshToken);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
        assert_eq!(coordinator.exchanges(), 0);
        assert_eq!(listener.0.load(Ordering::SeqCst), 1);
        assert!(store.is_empty());
        assert!(!coordinator.is_refreshing());
    }

    #[tokio::test]
    async fn late_401_reuses_already_refreshed_token() {
        let store = seeded_store();
        store
            .set_access_token(&AccessToken::new("already-new"))
            .unwrap();
        let backend = GatedBackend::new(Ok("unused"));
        let coordinator = RefreshCoordinator::new(store, backend.clone());

        let token = coordinator
            .obtain_token(Some(&AccessToken::new("old-access")))
            .await
            .unwrap();

        assert_eq!(token.as_str(), "already-new");
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn logout_during_refresh_discards_new_token() {
        let store = seeded_store();
        let backend = GatedBackend::new(Ok("new-access"));
        let listener = Arc::new(CountingListener::default());
        let coordinator = Arc::new(
            RefreshCoordinator::new(store.clone(), backend.clone())
                .with_expiry_listener(listener.clone()),
        );

        let leader = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move {
                coordinator
                    .obtain_token(Some(&AccessToken::new("old-access")))
                    .await
            })
        };
        while !coordinator.is_refreshing() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }

        coordinator
            .exclusive(|store| store.clear_credentials())
            .unwrap();
        backend.gate.notify_one();

        let err = leader.await.unwrap().unwrap_err();
        assert_eq!(err, RefreshFailure::Superseded);
        assert!(store.is_empty());
        assert_eq!(listener.0.load(Ordering::SeqCst), 0);
        assert!(!coordinator.is_refreshing());
    }

    #[tokio::test]
    async fn failed_refresh_leaves_newer_login_alone() {
        let store = seeded_store();
        let backend = GatedBackend::new(Err(401));
        let listener = Arc::new(CountingListener::default());
        let coordinator = Arc::new(
            RefreshCoordinator::new(store.clone(), backend.clone())
                .with_expiry_listener(listener.clone()),
        );

        let leader = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move {
                coordinator
                    .obtain_token(Some(&AccessToken::new("old-access")))
                    .await
            })
        };
        while !coordinator.is_refreshing() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }

        let bob = Credentials::new(
            AccessToken::new("bob-access"),
            RefreshToken::new("bob-refresh"),
            "bob",
            8,
        );
        coordinator
            .exclusive(|store| store.save_credentials(&bob))
            .unwrap();
        backend.gate.notify_one();

        let err = leader.await.unwrap().unwrap_err();
        assert_eq!(err, RefreshFailure::Superseded);
        assert_eq!(
            store.get(ACCESS_TOKEN_KEY).unwrap().as_deref(),
            Some("bob-access")
        );
        assert_eq!(store.get(USERNAME_KEY).unwrap().as_deref(), Some("bob"));
        assert_eq!(listener.0.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn dropped_leader_releases_waiters() {
        let store = seeded_store();
        let backend = GatedBackend::new(Ok("never"));
        let coordinator = Arc::new(RefreshCoordinator::new(store, backend.clone()));
        let stale = AccessToken::new("old-access");

        let leader = {
            let coordinator = coordinator.clone();
            let stale = stale.clone();
            tokio::spawn(async move { coordinator.obtain_token(Some(&stale)).await })
        };
        while !coordinator.is_refreshing() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        let follower = {
            let coordinator = coordinator.clone();
            let stale = stale.clone();
            tokio::spawn(async move { coordinator.obtain_token(Some(&stale)).await })
        };

        wait_for_queue(&coordinator, 1).await;
        leader.abort();
        let _ = leader.await;

        let err = follower.await.unwrap().unwrap_err();
        assert_eq!(err, RefreshFailure::Abandoned);
        assert!(!coordinator.is_refreshing());
    }
}
