//! Session Manager: owns the in-memory session and mediates every change
//! through the durable token store.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use super::error::{SessionError, StoreError};
use super::store::{TokenStore, DEFAULT_TOKEN_KEY};
use crate::config::Config;

/// Immutable snapshot of the authentication state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub token: Option<String>,
    pub loading: bool,
}

impl Session {
    /// State at process start, before the persisted token has been read.
    pub fn initializing() -> Self {
        Self {
            token: None,
            loading: true,
        }
    }

    pub fn state(&self) -> SessionState {
        match (self.loading, &self.token) {
            (true, _) => SessionState::Initializing,
            (false, Some(_)) => SessionState::Authenticated,
            (false, None) => SessionState::Unauthenticated,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.state() == SessionState::Authenticated
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::initializing()
    }
}

/// Lifecycle states. Nothing ever returns to `Initializing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Initializing,
    Unauthenticated,
    Authenticated,
}

/// Single authority for authentication state.
///
/// Built once at the composition root and shared by reference (usually an
/// `Arc<SessionManager>`) with every collaborator that needs it. Each
/// mutation publishes a fresh `Session` snapshot to subscribers.
///
/// `initialize`, `login` and `logout` are serialized in call order, so the
/// store write/delete and the in-memory update of one operation never
/// interleave with another's.
pub struct SessionManager {
    store: Arc<dyn TokenStore>,
    token_key: String,
    init_timeout: Option<Duration>,
    state_tx: watch::Sender<Session>,
    initialized: AtomicBool,
    ops: Mutex<()>,
}

impl SessionManager {
    pub fn new(store: Arc<dyn TokenStore>) -> Self {
        let (state_tx, _) = watch::channel(Session::initializing());
        Self {
            store,
            token_key: DEFAULT_TOKEN_KEY.to_string(),
            init_timeout: None,
            state_tx,
            initialized: AtomicBool::new(false),
            ops: Mutex::new(()),
        }
    }

    /// Build a manager using the key and startup timeout from `config`.
    pub fn from_config(config: &Config, store: Arc<dyn TokenStore>) -> Self {
        Self::new(store)
            .with_token_key(config.token_key.clone())
            .with_init_timeout(config.init_timeout())
    }

    pub fn with_token_key(mut self, key: impl Into<String>) -> Self {
        self.token_key = key.into();
        self
    }

    /// Bound the startup read. `None` waits for the store indefinitely.
    pub fn with_init_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.init_timeout = timeout;
        self
    }

    /// Current snapshot. No side effects.
    pub fn session(&self) -> Session {
        self.state_tx.borrow().clone()
    }

    pub fn state(&self) -> SessionState {
        self.state_tx.borrow().state()
    }

    /// Receive every snapshot published from now on.
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.state_tx.subscribe()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    /// Load the persisted token. Completes at most once per manager; later
    /// calls leave the store alone and return the current snapshot. A call
    /// dropped before its read finishes leaves the manager uninitialized.
    ///
    /// A store failure or timeout counts as "no token": the user lands on
    /// the unauthenticated graph instead of an error.
    ///
    /// A call made while the first read is in flight waits for it and then
    /// returns its result.
    pub async fn initialize(&self) -> Session {
        let _op = self.ops.lock().await;
        if self.initialized.load(Ordering::SeqCst) {
            warn!("Session already initialized, ignoring repeated initialize()");
            return self.session();
        }

        debug!(key = %self.token_key, "Loading persisted token");

        let token = match self.read_persisted().await {
            Ok(Some(token)) if !token.is_empty() => Some(token),
            Ok(Some(_)) => {
                debug!("Persisted token is empty, treating as absent");
                None
            }
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "Failed to read persisted token, starting unauthenticated");
                None
            }
        };

        self.state_tx.send_modify(|session| {
            session.token = token;
            session.loading = false;
        });
        self.initialized.store(true, Ordering::SeqCst);

        let session = self.session();
        info!(state = ?session.state(), "Session initialized");
        session
    }

    async fn read_persisted(&self) -> Result<Option<String>, StoreError> {
        let read = self.store.get(&self.token_key);
        match self.init_timeout {
            Some(limit) => tokio::time::timeout(limit, read).await.map_err(|_| {
                StoreError::unavailable(format!("Timed out after {}ms", limit.as_millis()))
            })?,
            None => read.await,
        }
    }

    /// Persist `token`, then adopt it in memory.
    ///
    /// If the write fails the in-memory token is left unchanged.
    pub async fn login(&self, token: impl Into<String>) -> Result<(), SessionError> {
        let token = token.into();
        if token.is_empty() {
            return Err(SessionError::InvalidArgument(
                "token must not be empty".to_string(),
            ));
        }

        let _op = self.ops.lock().await;
        if let Err(e) = self.store.set(&self.token_key, &token).await {
            warn!(error = %e, "Failed to persist token, session unchanged");
            return Err(e.into());
        }

        let token_len = token.len();
        self.state_tx.send_modify(|session| session.token = Some(token));
        info!(token_len, "Logged in");
        Ok(())
    }

    /// Delete the persisted token and clear it from memory.
    ///
    /// The in-memory token is cleared even when the delete fails; the
    /// failure is still returned. Logging out while logged out succeeds.
    pub async fn logout(&self) -> Result<(), SessionError> {
        let _op = self.ops.lock().await;
        let deleted = self.store.delete(&self.token_key).await;

        let was_authenticated = self.state_tx.borrow().token.is_some();
        self.state_tx.send_modify(|session| session.token = None);

        match deleted {
            Ok(()) => {
                info!(was_authenticated, "Logged out");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Logged out, but failed to delete persisted token");
                Err(e.into())
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::store::{MemoryTokenStore, StoreResult};
    use async_trait::async_trait;

    fn manager(store: &MemoryTokenStore) -> SessionManager {
        SessionManager::new(Arc::new(store.clone()))
    }

    /// A store whose reads never complete.
    struct HangingStore;

    #[async_trait]
    impl TokenStore for HangingStore {
        async fn get(&self, _key: &str) -> StoreResult<Option<String>> {
            futures::future::pending().await
        }

        async fn set(&self, _key: &str, _value: &str) -> StoreResult<()> {
            Ok(())
        }

        async fn delete(&self, _key: &str) -> StoreResult<()> {
            Ok(())
        }
    }

    /// A store whose reads take a while to answer.
    struct SlowStore {
        inner: MemoryTokenStore,
        delay: Duration,
    }

    #[async_trait]
    impl TokenStore for SlowStore {
        async fn get(&self, key: &str) -> StoreResult<Option<String>> {
            tokio::time::sleep(self.delay).await;
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
            self.inner.set(key, value).await
        }

        async fn delete(&self, key: &str) -> StoreResult<()> {
            self.inner.delete(key).await
        }
    }

    // -------------------------------------------------------------------------
    // Session snapshot Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_session_state_derivation() {
        let mut session = Session::initializing();
        assert_eq!(session.state(), SessionState::Initializing);

        session.token = Some("abc".to_string());
        assert_eq!(session.state(), SessionState::Initializing);

        session.loading = false;
        assert_eq!(session.state(), SessionState::Authenticated);
        assert!(session.is_authenticated());

        session.token = None;
        assert_eq!(session.state(), SessionState::Unauthenticated);
    }

    #[test]
    fn test_new_manager_starts_loading() {
        let store = MemoryTokenStore::new();
        let manager = manager(&store);
        assert_eq!(manager.session(), Session::initializing());
        assert!(!manager.is_initialized());
    }

    // -------------------------------------------------------------------------
    // initialize() Tests
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_initialize_with_stored_token() {
        let store = MemoryTokenStore::with_value(DEFAULT_TOKEN_KEY, "tok-123");
        let manager = manager(&store);

        let session = manager.initialize().await;
        assert_eq!(
            session,
            Session {
                token: Some("tok-123".to_string()),
                loading: false,
            }
        );
        assert_eq!(manager.state(), SessionState::Authenticated);
    }

    #[tokio::test]
    async fn test_initialize_with_empty_store() {
        let store = MemoryTokenStore::new();
        let manager = manager(&store);

        let session = manager.initialize().await;
        assert_eq!(session.token, None);
        assert!(!session.loading);
        assert_eq!(manager.state(), SessionState::Unauthenticated);
    }

    #[tokio::test]
    async fn test_initialize_treats_empty_stored_value_as_absent() {
        let store = MemoryTokenStore::with_value(DEFAULT_TOKEN_KEY, "");
        let manager = manager(&store);

        let session = manager.initialize().await;
        assert_eq!(session.token, None);
        assert!(!session.loading);
    }

    #[tokio::test]
    async fn test_initialize_store_failure_is_unauthenticated() {
        let store = MemoryTokenStore::with_value(DEFAULT_TOKEN_KEY, "tok-123");
        store.fail_get(true);
        let manager = manager(&store);

        let session = manager.initialize().await;
        assert_eq!(session.token, None);
        assert!(!session.loading);
    }

    #[tokio::test]
    async fn test_initialize_runs_once() {
        let store = MemoryTokenStore::new();
        let manager = manager(&store);
        manager.initialize().await;

        // A value appearing later is not picked up by a second initialize
        store.set(DEFAULT_TOKEN_KEY, "late").await.unwrap();
        let session = manager.initialize().await;
        assert_eq!(session.token, None);
        assert!(!session.loading);
        assert!(manager.is_initialized());
    }

    #[tokio::test]
    async fn test_overlapping_initialize_waits_for_first_read() {
        let store = SlowStore {
            inner: MemoryTokenStore::with_value(DEFAULT_TOKEN_KEY, "tok-slow"),
            delay: Duration::from_millis(30),
        };
        let manager = SessionManager::new(Arc::new(store));

        let (first, second) =
            futures::future::join(manager.initialize(), manager.initialize()).await;
        assert_eq!(first, second);
        assert!(!second.loading);
        assert_eq!(second.token.as_deref(), Some("tok-slow"));
    }

    #[tokio::test]
    async fn test_cancelled_initialize_can_be_retried() {
        let manager = SessionManager::new(Arc::new(SlowStore {
            inner: MemoryTokenStore::with_value(DEFAULT_TOKEN_KEY, "tok-retry"),
            delay: Duration::from_millis(20),
        }));

        let cancelled = tokio::time::timeout(Duration::from_millis(5), manager.initialize()).await;
        assert!(cancelled.is_err());
        assert!(!manager.is_initialized());

        let session = manager.initialize().await;
        assert_eq!(session.token.as_deref(), Some("tok-retry"));
        assert!(manager.is_initialized());
    }

    #[tokio::test]
    async fn test_initialize_uses_configured_key() {
        let store = MemoryTokenStore::with_value("customKey", "tok-custom");
        let manager = SessionManager::new(Arc::new(store.clone())).with_token_key("customKey");

        let session = manager.initialize().await;
        assert_eq!(session.token.as_deref(), Some("tok-custom"));
    }

    #[tokio::test]
    async fn test_initialize_timeout_falls_back_to_unauthenticated() {
        let manager = SessionManager::new(Arc::new(HangingStore))
            .with_init_timeout(Some(Duration::from_millis(20)));

        let session = manager.initialize().await;
        assert_eq!(session.token, None);
        assert!(!session.loading);
    }

    #[tokio::test]
    async fn test_initialize_without_timeout_stays_loading() {
        let manager = Arc::new(SessionManager::new(Arc::new(HangingStore)));
        let task = {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move { manager.initialize().await })
        };

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(manager.session().loading);
        task.abort();
    }

    // -------------------------------------------------------------------------
    // login() Tests
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_login_persists_and_updates_session() {
        let store = MemoryTokenStore::new();
        let manager = manager(&store);
        manager.initialize().await;

        manager.login("tok-999").await.unwrap();
        assert_eq!(store.peek(DEFAULT_TOKEN_KEY), Some("tok-999".to_string()));
        assert_eq!(manager.session().token.as_deref(), Some("tok-999"));
        assert_eq!(manager.state(), SessionState::Authenticated);
    }

    #[tokio::test]
    async fn test_login_survives_restart() {
        let store = MemoryTokenStore::new();
        for token in ["a", "tok-123", "a much longer token with spaces"] {
            let first = manager(&store);
            first.initialize().await;
            first.login(token).await.unwrap();

            let restarted = manager(&store);
            let session = restarted.initialize().await;
            assert_eq!(session.token.as_deref(), Some(token));
        }
    }

    #[tokio::test]
    async fn test_login_empty_token_rejected() {
        let store = MemoryTokenStore::with_value(DEFAULT_TOKEN_KEY, "existing");
        let manager = manager(&store);
        manager.initialize().await;

        let err = manager.login("").await.unwrap_err();
        assert!(matches!(err, SessionError::InvalidArgument(_)));
        assert_eq!(manager.session().token.as_deref(), Some("existing"));
        assert_eq!(store.peek(DEFAULT_TOKEN_KEY), Some("existing".to_string()));
    }

    #[tokio::test]
    async fn test_login_empty_token_does_not_touch_store() {
        let store = MemoryTokenStore::new();
        store.fail_set(true);
        let manager = manager(&store);
        manager.initialize().await;

        // InvalidArgument wins over the store failure: no write was attempted
        let err = manager.login("").await.unwrap_err();
        assert!(matches!(err, SessionError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_login_store_failure_leaves_token_unchanged() {
        let store = MemoryTokenStore::new();
        let manager = manager(&store);
        manager.initialize().await;
        manager.login("first").await.unwrap();

        store.fail_set(true);
        let err = manager.login("second").await.unwrap_err();
        assert!(matches!(err, SessionError::PersistenceError(_)));
        assert_eq!(manager.session().token.as_deref(), Some("first"));
        assert_eq!(store.peek(DEFAULT_TOKEN_KEY), Some("first".to_string()));
    }

    // -------------------------------------------------------------------------
    // logout() Tests
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_logout_clears_memory_and_store() {
        let store = MemoryTokenStore::with_value(DEFAULT_TOKEN_KEY, "tok-123");
        let manager = manager(&store);
        manager.initialize().await;

        manager.logout().await.unwrap();
        assert_eq!(manager.session().token, None);
        assert_eq!(store.peek(DEFAULT_TOKEN_KEY), None);
        assert_eq!(manager.state(), SessionState::Unauthenticated);
    }

    #[tokio::test]
    async fn test_logout_is_idempotent() {
        let store = MemoryTokenStore::with_value(DEFAULT_TOKEN_KEY, "tok-123");
        let manager = manager(&store);
        manager.initialize().await;

        manager.logout().await.unwrap();
        let once = manager.session();
        manager.logout().await.unwrap();
        assert_eq!(manager.session(), once);
        assert_eq!(once.token, None);
    }

    #[tokio::test]
    async fn test_logout_store_failure_still_clears_memory() {
        let store = MemoryTokenStore::with_value(DEFAULT_TOKEN_KEY, "tok-123");
        let manager = manager(&store);
        manager.initialize().await;

        store.fail_delete(true);
        let err = manager.logout().await.unwrap_err();
        assert!(matches!(err, SessionError::PersistenceError(_)));
        assert_eq!(manager.session().token, None);
        assert_eq!(manager.state(), SessionState::Unauthenticated);
    }

    // -------------------------------------------------------------------------
    // Notification and ordering Tests
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_subscribers_see_each_transition() {
        let store = MemoryTokenStore::new();
        let manager = manager(&store);
        let mut rx = manager.subscribe();
        assert!(rx.borrow_and_update().loading);

        manager.initialize().await;
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().state(), SessionState::Unauthenticated);

        manager.login("tok").await.unwrap();
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().state(), SessionState::Authenticated);

        manager.logout().await.unwrap();
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().state(), SessionState::Unauthenticated);
    }

    #[tokio::test]
    async fn test_failed_login_publishes_nothing() {
        let store = MemoryTokenStore::new();
        let manager = manager(&store);
        manager.initialize().await;
        let rx = manager.subscribe();

        store.fail_set(true);
        let _ = manager.login("tok").await;
        assert!(!rx.has_changed().unwrap());
    }

    #[tokio::test]
    async fn test_concurrent_mutators_leave_memory_and_store_consistent() {
        let store = MemoryTokenStore::new();
        let manager = Arc::new(manager(&store));
        manager.initialize().await;

        for round in 0..20 {
            let token = format!("tok-{}", round);
            let (login, logout) =
                futures::future::join(manager.login(token), manager.logout()).await;
            login.unwrap();
            logout.unwrap();
            assert_eq!(manager.session().token, store.peek(DEFAULT_TOKEN_KEY));
        }
    }

    #[tokio::test]
    async fn test_login_waits_for_initialize() {
        let store = MemoryTokenStore::with_value(DEFAULT_TOKEN_KEY, "stored");
        let manager = manager(&store);

        let (session, login) =
            futures::future::join(manager.initialize(), manager.login("fresh")).await;
        login.unwrap();
        assert!(!session.loading);
        assert_eq!(manager.session().token.as_deref(), Some("fresh"));
        assert_eq!(store.peek(DEFAULT_TOKEN_KEY), Some("fresh".to_string()));
    }
}
