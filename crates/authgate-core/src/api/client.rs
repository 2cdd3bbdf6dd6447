//! Client for the user-account service.
//!
//! Registration and sign-in are plain JSON POSTs. A sign-in response carries
//! the opaque token that the caller hands to `SessionManager::login`.

use std::time::Duration;

use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::ApiError;
use crate::config::Config;
use crate::forms::{LoginForm, RegisterForm};

/// Path of the user collection on the account service
const USERS_PATH: &str = "/api/Users";

/// Path of the sign-in endpoint
const LOGIN_PATH: &str = "/api/Users/login";

const REGISTRATION_FAILED: &str = "Registration failed.";
const SIGN_IN_FAILED: &str = "Login failed.";

/// Shape of every account-service reply. Fields the service leaves out
/// default to empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AccountResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl AccountResponse {
    /// The token of a successful sign-in.
    pub fn into_token(self) -> Result<String, ApiError> {
        match self.token.filter(|t| !t.is_empty()) {
            Some(token) if self.success => Ok(token),
            _ => Err(ApiError::Rejected(
                self.message.unwrap_or_else(|| SIGN_IN_FAILED.to_string()),
            )),
        }
    }
}

#[derive(Debug, Serialize)]
struct RegisterRequest<'a> {
    username: &'a str,
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
struct SignInRequest<'a> {
    email: &'a str,
    password: &'a str,
}

/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct AccountClient {
    client: Client,
    base_url: String,
}

impl AccountClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, ApiError> {
        Self::new(config.api_base_url.clone(), config.request_timeout())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Create an account. The form is not re-validated here.
    pub async fn register(&self, form: &RegisterForm) -> Result<AccountResponse, ApiError> {
        let body = RegisterRequest {
            username: &form.username,
            email: &form.email,
            password: &form.password,
        };
        self.post(USERS_PATH, &body, REGISTRATION_FAILED).await
    }

    /// Exchange credentials for a session token.
    pub async fn sign_in(&self, form: &LoginForm) -> Result<String, ApiError> {
        let body = SignInRequest {
            email: &form.email,
            password: &form.password,
        };
        self.post(LOGIN_PATH, &body, SIGN_IN_FAILED)
            .await?
            .into_token()
    }

    async fn post<B: Serialize>(
        &self,
        path: &str,
        body: &B,
        fallback: &str,
    ) -> Result<AccountResponse, ApiError> {
        let url = self.url(path);
        debug!(url = %url, "POST");

        let response = self
            .client
            .post(&url)
            .header(header::ACCEPT, "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| {
                warn!(url = %url, error = %e, "Account service unreachable");
                ApiError::Network(e)
            })?;

        let status = response.status();
        let text = response.text().await?;
        let parsed: Option<AccountResponse> = serde_json::from_str(&text).ok();

        if !status.is_success() {
            let message = parsed.and_then(|r| r.message);
            return Err(ApiError::from_status(status, message, &text, fallback));
        }

        // Some endpoints answer 2xx with an empty body; that still counts as success
        Ok(parsed.unwrap_or(AccountResponse {
            success: true,
            ..Default::default()
        }))
    }
}
