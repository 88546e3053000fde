//! Authentication Module
//!
//! Bearer API-key authentication. When no key is configured every caller
//! is authorized.

use async_trait::async_trait;
use serde::Serialize;
use std::fmt;

use crate::error::{AppError, Result};

/// Credentials extracted from a request
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    /// API key (if provided)
    pub api_key: Option<String>,
}

impl Credentials {
    pub fn new(api_key: Option<String>) -> Self {
        Self { api_key }
    }

    /// Parse an `Authorization` header value (`Bearer <key>`)
    pub fn from_authorization_header(auth_header: Option<&str>) -> Self {
        let api_key = auth_header
            .and_then(|header| header.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .map(str::to_string);
        Self::new(api_key)
    }
}

/// How a caller was let through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    /// No key configured
    Open,
    /// Key matched
    ApiKey,
}

impl fmt::Display for AuthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthMode::Open => write!(f, "open"),
            AuthMode::ApiKey => write!(f, "api_key"),
        }
    }
}

/// Authentication trait
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Check credentials; `Ok` means the caller is authorized
    async fn authenticate(&self, credentials: &Credentials) -> Result<AuthMode>;
    /// Whether callers must present credentials at all
    fn is_required(&self) -> bool;
    /// Get the authenticator type
    fn authenticator_type(&self) -> &'static str;
}

/// Single shared API key
#[derive(Clone)]
pub struct ApiKeyAuth {
    api_key: Option<String>,
}

impl fmt::Debug for ApiKeyAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiKeyAuth")
            .field("enabled", &self.api_key.is_some())
            .finish()
    }
}

impl ApiKeyAuth {
    /// Create a new API key authenticator; an empty key disables authentication
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            api_key: api_key.filter(|key| !key.is_empty()),
        }
    }

    /// Authenticator that lets everyone through
    pub fn open() -> Self {
        Self { api_key: None }
    }
}

#[async_trait]
impl Authenticator for ApiKeyAuth {
    async fn authenticate(&self, credentials: &Credentials) -> Result<AuthMode> {
        let Some(expected) = &self.api_key else {
            return Ok(AuthMode::Open);
        };

        let provided = credentials.api_key.as_deref().ok_or_else(|| {
            AppError::Authentication(
                "Missing API key. Provide it as 'Authorization: Bearer <key>'".to_string(),
            )
        })?;

        if constant_time_eq(provided.as_bytes(), expected.as_bytes()) {
            Ok(AuthMode::ApiKey)
        } else {
            Err(AppError::Authentication("Invalid API key".to_string()))
        }
    }

    fn is_required(&self) -> bool {
        self.api_key.is_some()
    }

    fn authenticator_type(&self) -> &'static str {
        "ApiKey"
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_header_parsing() {
        let creds = Credentials::from_authorization_header(Some("Bearer secret"));
        assert_eq!(creds.api_key.as_deref(), Some("secret"));

        assert!(Credentials::from_authorization_header(Some("Basic abc")).api_key.is_none());
        assert!(Credentials::from_authorization_header(Some("Bearer ")).api_key.is_none());
        assert!(Credentials::from_authorization_header(None).api_key.is_none());
    }

    #[tokio::test]
    async fn test_open_when_no_key_configured() {
        let auth = ApiKeyAuth::new(None);
        assert!(!auth.is_required());
        assert_eq!(
            auth.authenticate(&Credentials::default()).await.unwrap(),
            AuthMode::Open
        );
        assert!(!ApiKeyAuth::new(Some(String::new())).is_required());
    }

    #[tokio::test]
    async fn test_key_checked_when_configured() {
        let auth = ApiKeyAuth::new(Some("secret".into()));
        assert_eq!(
            auth.authenticate(&Credentials::new(Some("secret".into())))
                .await
                .unwrap(),
            AuthMode::ApiKey
        );
        assert!(matches!(
            auth.authenticate(&Credentials::new(Some("wrong".into()))).await,
            Err(AppError::Authentication(_))
        ));
        assert!(matches!(
            auth.authenticate(&Credentials::default()).await,
            Err(AppError::Authentication(_))
        ));
    }
}
