//! Tool-invocation marker extraction.
//!
//! The model is instructed to request tools by emitting
//! `<tool_call>{"name": "...", "arguments": {...}}</tool_call>` in its text.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::debug;

use crate::models::message::ToolCall;

static TOOL_CALL_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)<tool_call>\s*(\{.*?\})\s*</tool_call>").expect("tool call pattern is valid")
});

/// Extract every well-formed tool call marker, in order of appearance.
pub fn extract_tool_calls(content: &str) -> Vec<ToolCall> {
    TOOL_CALL_MARKER
        .captures_iter(content)
        .filter_map(|caps| parse_marker(&caps[1]))
        .collect()
}

fn parse_marker(body: &str) -> Option<ToolCall> {
    let value: Value = match serde_json::from_str(body) {
        Ok(value) => value,
        Err(e) => {
            debug!(error = %e, "skipping malformed tool call marker");
            return None;
        }
    };

    let name = value.get("name").and_then(Value::as_str)?;
    if name.trim().is_empty() {
        return None;
    }

    let arguments = match value.get("arguments") {
        Some(Value::String(raw)) => raw.clone(),
        Some(other) => other.to_string(),
        None => "{}".to_string(),
    };

    Some(ToolCall::function(name, arguments))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_calls_in_order() {
        let text = r#"Let me check.
<tool_call>{"name": "get_weather", "arguments": {"city": "Paris"}}</tool_call>
and then
<tool_call>
  {"name": "get_time", "arguments": "{\"tz\":\"CET\"}"}
</tool_call>"#;

        let calls = extract_tool_calls(text);
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].function.name, "get_weather");
        assert_eq!(calls[0].function.arguments, r#"{"city":"Paris"}"#);
        assert_eq!(calls[0].call_type, "function");
        assert!(calls[0].id.starts_with("call_"));
        assert_eq!(calls[1].function.name, "get_time");
        assert_eq!(calls[1].function.arguments, r#"{"tz":"CET"}"#);
    }

    #[test]
    fn test_malformed_markers_are_skipped() {
        let text = "<tool_call>{not json}</tool_call><tool_call>{\"arguments\": {}}</tool_call>";
        assert!(extract_tool_calls(text).is_empty());
    }

    #[test]
    fn test_missing_arguments_default_to_empty_object() {
        let calls = extract_tool_calls(r#"<tool_call>{"name": "ping"}</tool_call>"#);
        assert_eq!(calls[0].function.arguments, "{}");
    }

    #[test]
    fn test_plain_text_has_no_calls() {
        assert!(extract_tool_calls("just words").is_empty());
    }
}
