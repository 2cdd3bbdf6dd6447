//! Authentication module for managing the user session and its persisted token.
//!
//! This module provides:
//! - `SessionManager`: the single authority for authentication state
//! - `TokenStore`: the durable single-slot credential capability, with
//!   keyring, file and in-memory backends
//!
//! The store is the source of truth across restarts; the in-memory session
//! is a cache of it, refreshed at startup and on login/logout.

pub mod error;
pub mod session;
pub mod store;

pub use error::{SessionError, StoreError};
pub use session::{Session, SessionManager, SessionState};
pub use store::{FileTokenStore, KeyringTokenStore, MemoryTokenStore, TokenStore};
