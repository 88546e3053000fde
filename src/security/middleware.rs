//! Security Middleware Module
//!
//! Axum middleware for authentication and security headers.

use axum::{
    body::Body,
    extract::{Request, State},
    http::{HeaderValue, header},
    middleware::Next,
    response::Response,
};
use tracing::debug;

use crate::api::app_state::AppState;
use crate::error::AppError;
use crate::security::auth::Credentials;

/// Authentication middleware, installed with `from_fn_with_state`
pub async fn auth_middleware(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let credentials = extract_credentials(&req);
    let mode = state.authenticator.authenticate(&credentials).await?;
    debug!(path = %req.uri().path(), auth = %mode, "request authorized");
    Ok(next.run(req).await)
}

/// Extract credentials from request headers
fn extract_credentials(req: &Request<Body>) -> Credentials {
    if let Some(auth) = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
    {
        return Credentials::from_authorization_header(Some(auth));
    }

    if let Some(key) = req.headers().get("X-API-Key").and_then(|h| h.to_str().ok()) {
        return Credentials::new(Some(key.to_string()));
    }

    Credentials::default()
}

/// Security headers middleware
pub async fn security_headers_middleware(req: Request<Body>, next: Next) -> Response {
    let mut response = next.run(req).await;
    let headers = response.headers_mut();

    headers.insert(
        "X-Content-Type-Options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert("X-Frame-Options", HeaderValue::from_static("DENY"));
    headers.insert(
        "Referrer-Policy",
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );

    response
}
