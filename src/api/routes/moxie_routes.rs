//! Moxie Routes

use axum::{
    Router,
    routing::{get, post},
};

use crate::api::app_state::AppState;
use crate::api::handlers::moxie_handler::*;

/// 需要认证的 Moxie 路由
pub fn create_moxie_router() -> Router<AppState> {
    Router::new()
        .route("/moxie/analyze", post(analyze))
        .route("/moxie/identify", post(identify))
        .route("/moxie/users", get(list_users).post(create_user))
}

/// 公开路由
pub fn create_public_moxie_router() -> Router<AppState> {
    Router::new().route("/moxie/emotions", get(list_emotions))
}
