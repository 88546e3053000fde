//! Raw model-process events and the canonical stream events they are
//! normalized into.

use futures_util::stream::BoxStream;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::time::Duration;

use crate::models::message::ToolCall;

/// A single content block inside a raw event.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentBlock {
    /// Text fragment (possibly empty).
    Text(String),
    /// Any other block kind (tool use, thinking, images). Carries the tag.
    Other(String),
}

impl ContentBlock {
    /// Decode one block. Tagged `text` blocks, untagged objects exposing a
    /// `text` field and bare strings all count as text.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::String(s) => ContentBlock::Text(s.clone()),
            Value::Object(map) => {
                let text = map.get("text").and_then(Value::as_str);
                match map.get("type").and_then(Value::as_str) {
                    Some("text") | None => match text {
                        Some(text) => ContentBlock::Text(text.to_string()),
                        None => ContentBlock::Other("untyped".to_string()),
                    },
                    Some(kind) => ContentBlock::Other(kind.to_string()),
                }
            }
            _ => ContentBlock::Other("scalar".to_string()),
        }
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            ContentBlock::Text(text) => Some(text),
            ContentBlock::Other(_) => None,
        }
    }
}

/// Body of an assistant-message event.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageBody {
    Blocks(Vec<ContentBlock>),
    Text(String),
}

/// Terminal result reported by the model process.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultInfo {
    pub subtype: Option<String>,
    pub is_error: bool,
    pub session_id: Option<String>,
    pub total_cost_usd: Option<f64>,
    pub num_turns: Option<u64>,
    pub error_message: Option<String>,
}

/// Raw event emitted by the model process, decoded once at the boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum RawEvent {
    /// Event carrying a content list directly.
    DirectContent(Vec<ContentBlock>),
    /// `type: assistant` event wrapping a nested message.
    AssistantMessage(MessageBody),
    /// `type: system` init event.
    System {
        subtype: Option<String>,
        session_id: Option<String>,
        model: Option<String>,
    },
    /// `type: result` event.
    Result(ResultInfo),
    /// Anything else. Ignored by the translator.
    Unrecognized(Value),
}

impl RawEvent {
    /// Decode a JSON value. Never fails: unknown shapes become `Unrecognized`.
    pub fn from_value(value: Value) -> Self {
        if let Some(Value::Array(blocks)) = value.get("content") {
            return RawEvent::DirectContent(blocks.iter().map(ContentBlock::from_value).collect());
        }

        match value.get("type").and_then(Value::as_str) {
            Some("assistant") => {
                match value.get("message").and_then(|m| m.get("content")) {
                    Some(Value::Array(blocks)) => RawEvent::AssistantMessage(MessageBody::Blocks(
                        blocks.iter().map(ContentBlock::from_value).collect(),
                    )),
                    Some(Value::String(text)) => {
                        RawEvent::AssistantMessage(MessageBody::Text(text.clone()))
                    }
                    _ => RawEvent::Unrecognized(value),
                }
            }
            Some("system") => RawEvent::System {
                subtype: str_field(&value, "subtype"),
                session_id: str_field(&value, "session_id"),
                model: str_field(&value, "model"),
            },
            Some("result") => RawEvent::Result(ResultInfo {
                subtype: str_field(&value, "subtype"),
                is_error: value.get("is_error").and_then(Value::as_bool).unwrap_or(false),
                session_id: str_field(&value, "session_id"),
                total_cost_usd: value.get("total_cost_usd").and_then(Value::as_f64),
                num_turns: value.get("num_turns").and_then(Value::as_u64),
                error_message: str_field(&value, "error_message")
                    .or_else(|| str_field(&value, "result")),
            }),
            _ => RawEvent::Unrecognized(value),
        }
    }

    /// Decode one line of newline-delimited JSON. `None` when the line is
    /// not JSON at all.
    pub fn from_line(line: &str) -> Option<Self> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return None;
        }
        serde_json::from_str::<Value>(trimmed).ok().map(Self::from_value)
    }

    /// Text fragments in encounter order, empty ones included.
    pub fn fragments(&self) -> Vec<&str> {
        match self {
            RawEvent::DirectContent(blocks) | RawEvent::AssistantMessage(MessageBody::Blocks(blocks)) => {
                blocks.iter().filter_map(ContentBlock::text).collect()
            }
            RawEvent::AssistantMessage(MessageBody::Text(text)) => vec![text.as_str()],
            _ => Vec::new(),
        }
    }
}

fn str_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_string)
}

/// Failure while consuming the raw event stream.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StreamFailure {
    #[error("upstream failure: {0}")]
    Upstream(String),

    #[error("no response produced by the model")]
    EmptyResponse,

    #[error("model produced no output for {0:?}")]
    Timeout(Duration),
}

/// Async sequence of raw events, ended by stream end or an error item.
pub type RawEventStream = BoxStream<'static, Result<RawEvent, StreamFailure>>;

/// Finish reason of a completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    ToolCalls,
    Error,
}

impl fmt::Display for FinishReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stop => write!(f, "stop"),
            Self::ToolCalls => write!(f, "tool_calls"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Finalized completion.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub content: String,
    pub finish_reason: FinishReason,
    pub tool_calls: Vec<ToolCall>,
}

/// Canonical event produced by the translator. `Done` and `Error` are
/// terminal; exactly one of them closes every stream.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    TextDelta(String),
    ToolCall(ToolCall),
    Done(Completion),
    Error(StreamFailure),
}

impl StreamEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Done(_) | StreamEvent::Error(_))
    }

    pub fn finish_reason(&self) -> Option<FinishReason> {
        match self {
            StreamEvent::Done(completion) => Some(completion.finish_reason),
            StreamEvent::Error(_) => Some(FinishReason::Error),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_direct_content_wins_over_type() {
        let event = RawEvent::from_value(json!({
            "type": "assistant",
            "content": [{"type": "text", "text": "Hi"}, {"text": "there"}, "!"]
        }));
        assert_eq!(event.fragments(), vec!["Hi", "there", "!"]);
        assert!(matches!(event, RawEvent::DirectContent(_)));
    }

    #[test]
    fn test_assistant_message_shapes() {
        let blocks = RawEvent::from_value(json!({
            "type": "assistant",
            "message": {"content": [
                {"type": "text", "text": "Hello"},
                {"type": "tool_use", "name": "Bash", "input": {}}
            ]}
        }));
        assert_eq!(blocks.fragments(), vec!["Hello"]);

        let plain = RawEvent::from_value(json!({
            "type": "assistant",
            "message": {"content": "plain"}
        }));
        assert_eq!(plain, RawEvent::AssistantMessage(MessageBody::Text("plain".into())));
    }

    #[test]
    fn test_result_and_unrecognized() {
        let result = RawEvent::from_value(json!({
            "type": "result",
            "subtype": "error_during_execution",
            "is_error": true,
            "error_message": "boom"
        }));
        match result {
            RawEvent::Result(info) => {
                assert!(info.is_error);
                assert_eq!(info.error_message.as_deref(), Some("boom"));
            }
            other => panic!("unexpected event: {:?}", other),
        }

        assert!(matches!(
            RawEvent::from_value(json!({"type": "user"})),
            RawEvent::Unrecognized(_)
        ));
        assert!(RawEvent::from_line("not json").is_none());
        assert!(RawEvent::from_line("   ").is_none());
    }
}
