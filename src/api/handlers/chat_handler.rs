use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::HeaderMap,
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
};
use futures_util::stream::{self, BoxStream, Stream, StreamExt};
use serde::Serialize;
use std::convert::Infallible;
use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::{
    api::{app_state::AppState, handlers::parse_body, dto::chat_dto::*},
    error::AppError,
    models::chat::ChatCompletionRequest,
    models::message::{Message, Role},
    models::stream::{FinishReason, StreamEvent},
    observability::ObservabilityState,
    services::parameters::{HeaderOverrides, compatibility_report},
};

/// SSE 结束标记
pub const DONE_MARKER: &str = "[DONE]";

pub async fn chat_completions(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<ChatCompletionRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let request = parse_body(body)?;
    let overrides = HeaderOverrides::from_headers(&headers);
    let metrics = &state.observability.metrics;
    metrics.record_chat(request.stream);

    debug!(
        model = %request.model,
        messages = request.messages.len(),
        stream = request.stream,
        session_id = request.session_id.as_deref().unwrap_or("-"),
        "chat completion request"
    );

    if request.stream {
        let chat = state
            .chat
            .stream(&request, &overrides)
            .await
            .inspect_err(|_| metrics.record_chat_failure())?;

        let frames = sse_frames(
            completion_id(),
            request.model.clone(),
            chat.events,
            state.observability.clone(),
        );
        return Ok(Sse::new(frames.map(Ok::<_, Infallible>))
            .keep_alive(KeepAlive::default())
            .into_response());
    }

    let reply = state
        .chat
        .complete(&request, &overrides)
        .await
        .inspect_err(|_| metrics.record_chat_failure())?;

    let completion = reply.completion;
    let message = if completion.tool_calls.is_empty() {
        Message::assistant(reply.content)
    } else {
        Message {
            role: Role::Assistant,
            content: None,
            tool_calls: Some(completion.tool_calls),
        }
    };

    let mut response = ChatCompletionResponse::new(
        completion_id(),
        request.model,
        Choice {
            index: 0,
            message,
            finish_reason: completion.finish_reason,
        },
        Usage::new(reply.prompt_tokens, reply.completion_tokens),
    );
    response.session_id = reply.session_id;
    response.moxie = reply.moxie.map(|enhanced| MoxieMetadata {
        emotion: enhanced.emotion,
        commands: enhanced.commands,
        speech: enhanced.speech,
    });

    Ok(Json(response).into_response())
}

/// 把规范化事件编码为 SSE 帧：文本分块、工具调用分块、唯一的终止分块，最后是 `[DONE]`
pub fn sse_frames(
    id: String,
    model: String,
    events: BoxStream<'static, StreamEvent>,
    observability: Arc<ObservabilityState>,
) -> impl Stream<Item = Event> + Send + 'static {
    let mut first = true;
    let mut tool_index = 0u32;

    events
        .flat_map(move |event| {
            let frames: Vec<Event> = match event {
                StreamEvent::TextDelta(text) => {
                    let chunk = ChatCompletionChunk::content(&id, &model, text, first);
                    first = false;
                    json_event(&chunk).into_iter().collect()
                }
                StreamEvent::ToolCall(call) => {
                    let chunk = ChatCompletionChunk::tool_call(&id, &model, tool_index, call);
                    tool_index += 1;
                    json_event(&chunk).into_iter().collect()
                }
                StreamEvent::Done(completion) => {
                    let chunk = ChatCompletionChunk::finish(&id, &model, completion.finish_reason);
                    json_event(&chunk).into_iter().collect()
                }
                StreamEvent::Error(failure) => {
                    error!(completion_id = %id, error = %failure, "streaming completion failed");
                    observability.metrics.record_chat_failure();
                    let (_, code) = AppError::from(failure.clone()).status_and_type();
                    let payload = stream_error_payload(&failure.to_string(), code);
                    let chunk = ChatCompletionChunk::finish(&id, &model, FinishReason::Error);
                    [json_event(&payload), json_event(&chunk)]
                        .into_iter()
                        .flatten()
                        .collect()
                }
            };
            stream::iter(frames)
        })
        .chain(stream::once(async { Event::default().data(DONE_MARKER) }))
}

fn json_event<T: Serialize>(value: &T) -> Option<Event> {
    Event::default()
        .json_data(value)
        .map_err(|e| warn!(error = %e, "failed to encode SSE frame"))
        .ok()
}

pub async fn list_models() -> impl IntoResponse {
    Json(ModelListResponse::supported())
}

pub async fn check_compatibility(
    body: Result<Json<ChatCompletionRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let request = parse_body(body)?;
    Ok(Json(CompatibilityResponse::new(compatibility_report(&request))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::stream::{Completion, StreamFailure};

    async fn frames(events: Vec<StreamEvent>) -> Vec<String> {
        let observability = Arc::new(ObservabilityState::new("test"));
        sse_frames(
            "chatcmpl-test".into(),
            "m".into(),
            stream::iter(events).boxed(),
            observability,
        )
        .map(|event| format!("{:?}", event))
        .collect()
        .await
    }

    #[tokio::test]
    async fn test_frames_end_with_done() {
        let out = frames(vec![
            StreamEvent::TextDelta("Hel".into()),
            StreamEvent::TextDelta("lo".into()),
            StreamEvent::Done(Completion {
                content: "Hello".into(),
                finish_reason: FinishReason::Stop,
                tool_calls: Vec::new(),
            }),
        ])
        .await;
        assert_eq!(out.len(), 4);
        assert!(out[3].contains(DONE_MARKER));
    }

    #[tokio::test]
    async fn test_error_emits_payload_terminal_and_done() {
        let out = frames(vec![
            StreamEvent::TextDelta("partial".into()),
            StreamEvent::Error(StreamFailure::Upstream("boom".into())),
        ])
        .await;
        assert_eq!(out.len(), 4);
        assert!(out[1].contains("streaming_error"));
        assert!(out[2].contains("error"));
        assert!(out[3].contains(DONE_MARKER));
    }
}
