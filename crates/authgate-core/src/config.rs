//! Application configuration management.
//!
//! This module handles loading the application configuration,
//! which selects the token store backend, the key the session token is
//! stored under, and where the account service lives.
//!
//! Configuration is stored at `~/.config/authgate/config.json`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::auth::store::{DEFAULT_SERVICE, DEFAULT_TOKEN_KEY};
use crate::auth::{FileTokenStore, KeyringTokenStore, TokenStore};

/// Application name used for config/data directory paths
const APP_NAME: &str = "authgate";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Account service used when nothing else is configured.
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:5291";

/// HTTP request timeout in seconds.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Environment override for `api_base_url`
const ENV_API_URL: &str = "AUTHGATE_API_URL";

/// Environment override for `store_backend`
const ENV_STORE: &str = "AUTHGATE_STORE";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Keyring,
    File,
}

impl StoreBackend {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "keyring" => Some(StoreBackend::Keyring),
            "file" => Some(StoreBackend::File),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub store_backend: StoreBackend,
    pub keyring_service: String,
    pub token_key: String,
    /// Upper bound on the startup token read. Absent means wait forever.
    pub init_timeout_ms: Option<u64>,
    pub api_base_url: String,
    pub request_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_backend: StoreBackend::default(),
            keyring_service: DEFAULT_SERVICE.to_string(),
            token_key: DEFAULT_TOKEN_KEY.to_string(),
            init_timeout_ms: None,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents).context("Failed to parse config file")
        } else {
            Ok(Self::default())
        }
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn data_dir(&self) -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }

    /// Apply `AUTHGATE_*` environment overrides.
    pub fn apply_env(&mut self) {
        self.apply_overrides(
            std::env::var(ENV_API_URL).ok(),
            std::env::var(ENV_STORE).ok(),
        );
    }

    fn apply_overrides(&mut self, api_url: Option<String>, store: Option<String>) {
        if let Some(url) = api_url.filter(|u| !u.trim().is_empty()) {
            self.api_base_url = url.trim().to_string();
        }
        if let Some(backend) = store.as_deref().and_then(StoreBackend::parse) {
            self.store_backend = backend;
        }
    }

    pub fn init_timeout(&self) -> Option<Duration> {
        self.init_timeout_ms.map(Duration::from_millis)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Build the configured token store backend.
    pub fn token_store(&self) -> Result<Arc<dyn TokenStore>> {
        let store: Arc<dyn TokenStore> = match self.store_backend {
            StoreBackend::Keyring => {
                Arc::new(KeyringTokenStore::with_service(self.keyring_service.clone()))
            }
            StoreBackend::File => Arc::new(FileTokenStore::new(self.data_dir()?)),
        };
        Ok(store)
    }
}
