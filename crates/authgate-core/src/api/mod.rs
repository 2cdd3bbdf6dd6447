//! REST client module for the remote user-account service.
//!
//! This module provides the `AccountClient` used by the login and
//! registration screens. The Session Manager never talks to the service;
//! it only receives the token a successful sign-in yields.

pub mod client;
pub mod error;

pub use client::{AccountClient, AccountResponse};
pub use error::ApiError;
