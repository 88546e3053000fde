//! Session Routes
//!
//! 定义会话相关的 API 路由。

use axum::{
    Router,
    routing::get,
};

use crate::api::app_state::AppState;
use crate::api::handlers::session_handler::*;

/// 创建会话路由器
pub fn create_session_router() -> Router<AppState> {
    Router::new()
        .route("/sessions", get(list_sessions))
        .route("/sessions/stats", get(session_stats))
        .route("/sessions/:id", get(get_session).delete(delete_session))
}
