use thiserror::Error;

/// Failures reported by a `TokenStore` backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Token store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Token store contents unreadable: {0}")]
    Corrupt(String),
}

impl StoreError {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        StoreError::StoreUnavailable(reason.into())
    }
}

impl From<keyring::Error> for StoreError {
    fn from(err: keyring::Error) -> Self {
        match err {
            keyring::Error::NoStorageAccess(_) => {
                StoreError::StoreUnavailable("Cannot access keyring storage".to_string())
            }
            keyring::Error::PlatformFailure(_) => {
                StoreError::StoreUnavailable("Platform-specific keyring failure".to_string())
            }
            keyring::Error::BadEncoding(_) => {
                StoreError::Corrupt("Stored credential is not valid UTF-8".to_string())
            }
            _ => StoreError::StoreUnavailable(err.to_string()),
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::StoreUnavailable(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Corrupt(err.to_string())
    }
}

/// Errors surfaced by `SessionManager` mutators.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Rejected before any storage access.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Failed to persist session: {0}")]
    PersistenceError(#[from] StoreError),
}
