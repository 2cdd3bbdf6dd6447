//! Composition root for the authgate shell.
//!
//! `App` builds every service once and hands them out by reference; nothing
//! reaches the session through a global.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, warn};

use authgate_core::api::AccountClient;
use authgate_core::forms::{LoginForm, RegisterForm};
use authgate_core::screens::{ScreenGraph, SUPPORT_EMAIL};
use authgate_core::{Config, NavigationGate, RenderMode, Session, SessionManager};

pub struct App {
    pub config: Config,
    pub session: Arc<SessionManager>,
    pub accounts: AccountClient,
}

impl App {
    pub fn new() -> Result<Self> {
        let mut config = match Config::load() {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "Failed to load config, using defaults");
                Config::default()
            }
        };
        config.apply_env();
        debug!(backend = ?config.store_backend, api = %config.api_base_url, "Config loaded");

        let store = config.token_store().context("Failed to open token store")?;
        let session = Arc::new(SessionManager::from_config(&config, store));
        let accounts =
            AccountClient::from_config(&config).context("Failed to build account client")?;

        Ok(Self {
            config,
            session,
            accounts,
        })
    }

    pub fn gate(&self) -> NavigationGate {
        NavigationGate::new(self.session.subscribe())
    }

    pub async fn start(&self) -> Session {
        self.session.initialize().await
    }

    pub fn describe(session: &Session) -> String {
        let mode = RenderMode::decide(session);
        let graph = ScreenGraph::for_mode(mode);
        match mode {
            RenderMode::ShowLoadingIndicator => "Loading...".to_string(),
            RenderMode::ShowAuthenticatedGraph => {
                format!("Signed in ({} screen)", graph.title())
            }
            RenderMode::ShowUnauthenticatedGraph => {
                format!("Signed out ({} screen)", graph.title())
            }
        }
    }

    /// Validate the form, exchange it for a token and adopt the token.
    pub async fn sign_in(&self, form: LoginForm) -> Result<()> {
        form.validate()?;
        let token = self.accounts.sign_in(&form).await?;
        self.session
            .login(token)
            .await
            .context("Signed in, but the session could not be saved")?;
        Ok(())
    }

    /// Register an account. The user still has to sign in afterwards.
    pub async fn register(&self, form: RegisterForm) -> Result<String> {
        form.validate()?;
        let response = self.accounts.register(&form).await?;
        Ok(response
            .message
            .unwrap_or_else(|| "User registered successfully!".to_string()))
    }

    pub fn forgot_password() -> String {
        format!("Please contact us to reset your password: {}", SUPPORT_EMAIL)
    }
}
