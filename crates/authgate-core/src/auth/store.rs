//! Durable single-slot credential storage.
//!
//! A `TokenStore` persists one opaque string per key and survives process
//! restart. The Session Manager is its sole writer.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use keyring::Entry;
use tracing::{debug, warn};

use super::error::StoreError;

/// Result type for token store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Key under which the session token is persisted.
pub const DEFAULT_TOKEN_KEY: &str = "userToken";

/// Default keyring service name.
pub const DEFAULT_SERVICE: &str = "authgate";

/// File name used by `FileTokenStore` inside its directory.
const TOKEN_FILE: &str = "tokens.json";

/// Scratch file renamed over `TOKEN_FILE` on every write.
const TOKEN_TMP_FILE: &str = "tokens.json.tmp";

#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Read the value stored under `key`, `None` when absent.
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Store `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: &str) -> StoreResult<()>;

    /// Remove `key`. Removing an absent key succeeds.
    async fn delete(&self, key: &str) -> StoreResult<()>;
}

// ============================================================================
// Keyring
// ============================================================================

/// OS keychain backed store (Keychain, Credential Manager, Secret Service).
#[derive(Debug, Clone)]
pub struct KeyringTokenStore {
    service: String,
}

impl KeyringTokenStore {
    pub fn new() -> Self {
        Self::with_service(DEFAULT_SERVICE)
    }

    pub fn with_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    /// Run a blocking keyring call off the async executor.
    async fn run<T, F>(&self, key: &str, op: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(Entry) -> StoreResult<T> + Send + 'static,
    {
        let entry = Entry::new(&self.service, key)?;
        tokio::task::spawn_blocking(move || op(entry))
            .await
            .map_err(|e| StoreError::unavailable(format!("Keyring task failed: {}", e)))?
    }
}

impl Default for KeyringTokenStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TokenStore for KeyringTokenStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.run(key, |entry| match entry.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e.into()),
        })
        .await
    }

    async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        let value = value.to_string();
        self.run(key, move |entry| entry.set_password(&value).map_err(StoreError::from))
            .await?;
        debug!(key, "Stored credential in keyring");
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.run(key, |entry| match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e.into()),
        })
        .await?;
        debug!(key, "Deleted credential from keyring");
        Ok(())
    }
}

// ============================================================================
// File
// ============================================================================

/// Stores values as a JSON object in `<dir>/tokens.json`.
///
/// Intended for platforms without a usable keychain. The file is not
/// encrypted.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    dir: PathBuf,
}

impl FileTokenStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(TOKEN_FILE)
    }

    async fn read_all(path: &Path) -> StoreResult<HashMap<String, String>> {
        match tokio::fs::read_to_string(path).await {
            Ok(contents) if contents.trim().is_empty() => Ok(HashMap::new()),
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Like `read_all`, but an unreadable file counts as empty so that a
    /// write can replace it.
    async fn read_for_update(path: &Path) -> StoreResult<HashMap<String, String>> {
        match Self::read_all(path).await {
            Err(StoreError::Corrupt(reason)) => {
                warn!(path = ?path, %reason, "Discarding unreadable token file");
                Ok(HashMap::new())
            }
            other => other,
        }
    }

    /// Write to a sibling temp file and rename it over the real one, so a
    /// crash mid-write never leaves a truncated token file.
    async fn write_all(&self, values: &HashMap<String, String>) -> StoreResult<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let contents = serde_json::to_string_pretty(values)?;
        let tmp = self.dir.join(TOKEN_TMP_FILE);
        tokio::fs::write(&tmp, contents).await?;
        tokio::fs::rename(&tmp, self.path()).await?;
        Ok(())
    }

    async fn remove_file(path: &Path) -> StoreResult<()> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl TokenStore for FileTokenStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let values = Self::read_all(&self.path()).await?;
        Ok(values.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        let mut values = Self::read_for_update(&self.path()).await?;
        values.insert(key.to_string(), value.to_string());
        self.write_all(&values).await?;
        debug!(key, path = ?self.path(), "Stored credential in file");
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        let path = self.path();
        let mut values = match Self::read_all(&path).await {
            Ok(values) => values,
            // Nothing in an unreadable file can be trusted, the token included
            Err(StoreError::Corrupt(reason)) => {
                warn!(path = ?path, %reason, "Removing unreadable token file");
                return Self::remove_file(&path).await;
            }
            Err(e) => return Err(e),
        };
        if values.remove(key).is_none() {
            return Ok(());
        }
        if values.is_empty() {
            Self::remove_file(&path).await?;
        } else {
            self.write_all(&values).await?;
        }
        debug!(key, path = ?path, "Deleted credential from file");
        Ok(())
    }
}

// ============================================================================
// Memory
// ============================================================================

#[derive(Debug, Default)]
struct MemoryInner {
    values: HashMap<String, String>,
    fail_get: bool,
    fail_set: bool,
    fail_delete: bool,
}

/// Process-local store. Clones share the same slot, so a clone can stand in
/// for "the same device" across a simulated restart.
#[derive(Debug, Clone, Default)]
pub struct MemoryTokenStore {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with a single value.
    pub fn with_value(key: &str, value: &str) -> Self {
        let store = Self::new();
        store.lock().values.insert(key.to_string(), value.to_string());
        store
    }

    pub fn fail_get(&self, fail: bool) {
        self.lock().fail_get = fail;
    }

    pub fn fail_set(&self, fail: bool) {
        self.lock().fail_set = fail;
    }

    pub fn fail_delete(&self, fail: bool) {
        self.lock().fail_delete = fail;
    }

    /// Synchronous peek at the stored value, bypassing failure injection.
    pub fn peek(&self, key: &str) -> Option<String> {
        self.lock().values.get(key).cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryInner> {
        // A poisoned lock only means a panicking test thread; the map is still usable.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let inner = self.lock();
        if inner.fail_get {
            return Err(StoreError::unavailable("injected read failure"));
        }
        Ok(inner.values.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        let mut inner = self.lock();
        if inner.fail_set {
            return Err(StoreError::unavailable("injected write failure"));
        }
        inner.values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        let mut inner = self.lock();
        if inner.fail_delete {
            return Err(StoreError::unavailable("injected delete failure"));
        }
        inner.values.remove(key);
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
