use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::debug;

use crate::{
    api::{app_state::AppState, handlers::parse_body, dto::moxie_dto::*},
    error::AppError,
    models::profile::{SignalBundle, UserType},
    services::identity::new_moxie_session_id,
};

pub async fn analyze(
    State(state): State<AppState>,
    body: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let request = parse_body(body)?;
    if request.text.is_empty() {
        return Err(AppError::Validation("text field is required".to_string()));
    }

    let include_speech = request
        .include_speech
        .unwrap_or(state.config.moxie.speech_direction);
    let enhanced = state.enhancer.enhance(&request.text, include_speech);
    debug!(emotion = %enhanced.emotion, "analyzed text");

    Ok(Json(AnalyzeResponse::new(request.text, enhanced)))
}

pub async fn list_emotions(State(state): State<AppState>) -> impl IntoResponse {
    Json(EmotionListResponse {
        emotions: state.enhancer.classifier().describe(),
    })
}

pub async fn identify(
    State(state): State<AppState>,
    body: Result<Json<SignalBundle>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let signals = parse_body(body)?;
    let result = state.identifier.identify(&signals);
    state
        .observability
        .metrics
        .record_identification(result.profile.is_some());

    Ok(Json(IdentifyResponse::new(new_moxie_session_id(), result)))
}

pub async fn list_users(State(state): State<AppState>) -> impl IntoResponse {
    Json(UserListResponse {
        users: state
            .identifier
            .list()
            .into_iter()
            .map(UserSummary::from)
            .collect(),
        current_user: state.identifier.current_user().map(|profile| profile.id),
    })
}

pub async fn create_user(
    State(state): State<AppState>,
    body: Result<Json<CreateUserRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let request = parse_body(body)?;

    let name = request
        .name
        .filter(|name| !name.trim().is_empty())
        .ok_or_else(|| AppError::Validation("name is required".to_string()))?;
    let user_type = match request.user_type.as_deref() {
        Some(raw) => raw.parse::<UserType>().map_err(AppError::Validation)?,
        None => UserType::Adult,
    };

    let profile = state
        .identifier
        .create(&name, user_type, request.voice_profile, request.face_id)
        .await?;
    state.observability.metrics.record_profile_created();

    Ok((StatusCode::CREATED, Json(CreateUserResponse::from(profile))))
}
