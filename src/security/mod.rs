//! Security Module
//!
//! - Bearer API-key authentication
//! - Security middleware

pub mod auth;
pub mod middleware;

pub use auth::{ApiKeyAuth, AuthMode, Authenticator, Credentials};
