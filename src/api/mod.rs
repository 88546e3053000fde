//! API 模块
//!
//! 提供 OpenAI 兼容的 REST API 与 Moxie 扩展接口。

pub mod app_state;
pub mod dto;
pub mod handlers;
pub mod routes;

use axum::{
    Router,
    http::HeaderValue,
    middleware::{from_fn, from_fn_with_state},
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::api::app_state::AppState;
use crate::observability::{create_observability_router, metrics_middleware};
use crate::security::middleware::{auth_middleware, security_headers_middleware};

pub fn create_router(app_state: AppState) -> Router {
    let protected = Router::new()
        .merge(routes::chat_routes::create_chat_router())
        .merge(routes::session_routes::create_session_router())
        .merge(routes::moxie_routes::create_moxie_router())
        .route_layer(from_fn_with_state(app_state.clone(), auth_middleware));

    let public = Router::new()
        .merge(routes::chat_routes::create_public_chat_router())
        .merge(routes::moxie_routes::create_public_moxie_router());

    let observability = app_state.observability.clone();
    let cors = cors_layer(&app_state.config.server.cors_origins);

    Router::new()
        .nest("/v1", protected.merge(public))
        .with_state(app_state)
        .merge(create_observability_router(observability.clone()))
        .layer(from_fn_with_state(observability, metrics_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.iter().any(|origin| origin == "*") {
        return layer.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(allowed)
}
