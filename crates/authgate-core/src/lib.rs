//! Core library for authgate.
//!
//! This crate provides:
//! - `auth`: the Session Manager and the secure token store adapters
//! - `gate`: the Navigation Gate that maps session state to a render mode
//! - `screens`: the screen graphs mounted for each render mode
//! - `forms`: login and registration form validation
//! - `api`: client for the remote user-account service
//! - `config`: persisted application configuration

pub mod api;
pub mod auth;
pub mod config;
pub mod forms;
pub mod gate;
pub mod screens;

pub use auth::{Session, SessionError, SessionManager, SessionState, StoreError, TokenStore};
pub use config::Config;
pub use gate::{decide, NavigationGate, RenderMode};
