use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use tracing::debug;

use crate::{
    api::{app_state::AppState, dto::session_dto::*},
    error::AppError,
};

pub async fn list_sessions(State(state): State<AppState>) -> impl IntoResponse {
    let sessions = state.sessions.list_all();
    debug!(count = sessions.len(), "listing sessions");

    Json(SessionListResponse {
        total: sessions.len(),
        sessions,
    })
}

pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    debug!(session_id = %id, "getting session");

    let session = state
        .sessions
        .get(&id)
        .ok_or_else(|| AppError::NotFound("Session not found".to_string()))?;

    Ok(Json(SessionDetailResponse::from(session)))
}

pub async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    if !state.sessions.delete(&id) {
        return Err(AppError::NotFound("Session not found".to_string()));
    }

    Ok(Json(DeleteSessionResponse {
        message: format!("Session {} deleted successfully", id),
    }))
}

pub async fn session_stats(State(state): State<AppState>) -> impl IntoResponse {
    Json(SessionStatsResponse {
        session_stats: state.sessions.stats(),
    })
}
