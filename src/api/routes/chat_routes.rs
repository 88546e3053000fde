//! Chat Routes
//!
//! OpenAI 兼容的聊天补全路由。

use axum::{
    Router,
    routing::{get, post},
};

use crate::api::app_state::AppState;
use crate::api::handlers::chat_handler::*;

/// 需要认证的聊天路由
pub fn create_chat_router() -> Router<AppState> {
    Router::new().route("/chat/completions", post(chat_completions))
}

/// 公开路由
pub fn create_public_chat_router() -> Router<AppState> {
    Router::new()
        .route("/models", get(list_models))
        .route("/compatibility", post(check_compatibility))
}
