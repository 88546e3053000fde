//! Stream translation.
//!
//! Turns the raw event sequence of the model process into canonical
//! [`StreamEvent`]s: ordered non-empty text deltas, tool calls found at
//! finalization, then exactly one terminal event.

pub mod tool_calls;

use futures_util::stream::{self, BoxStream, StreamExt};
use std::collections::VecDeque;
use tracing::{debug, info, trace, warn};

use crate::error::{AppError, Result};
use crate::models::stream::{
    Completion, FinishReason, RawEvent, RawEventStream, StreamEvent, StreamFailure,
};

pub use tool_calls::extract_tool_calls;

/// Per-request translator configuration.
#[derive(Debug, Clone)]
pub struct TranslatorConfig {
    pub model: String,
    pub tools_enabled: bool,
}

/// Normalizes raw model-process output.
#[derive(Debug, Clone)]
pub struct StreamTranslator {
    config: TranslatorConfig,
}

struct TranslateState {
    raw: Option<RawEventStream>,
    fragments: Vec<String>,
    pending: VecDeque<StreamEvent>,
    config: TranslatorConfig,
}

impl TranslateState {
    fn absorb(&mut self, event: RawEvent) {
        match event {
            RawEvent::DirectContent(_) | RawEvent::AssistantMessage(_) => {
                for fragment in event.fragments() {
                    if fragment.is_empty() {
                        continue;
                    }
                    self.fragments.push(fragment.to_string());
                    self.pending
                        .push_back(StreamEvent::TextDelta(fragment.to_string()));
                }
            }
            RawEvent::Result(info) if info.is_error => {
                let message = info
                    .error_message
                    .or(info.subtype)
                    .unwrap_or_else(|| "model process reported an error".to_string());
                warn!(model = %self.config.model, error = %message, "model process failed");
                self.fail(StreamFailure::Upstream(message));
            }
            RawEvent::Result(info) => {
                info!(
                    session_id = info.session_id.as_deref().unwrap_or("-"),
                    cost_usd = info.total_cost_usd.unwrap_or_default(),
                    turns = info.num_turns.unwrap_or_default(),
                    "model run finished"
                );
            }
            RawEvent::System {
                subtype,
                session_id,
                model,
            } => {
                debug!(
                    subtype = subtype.as_deref().unwrap_or("-"),
                    session_id = session_id.as_deref().unwrap_or("-"),
                    model = model.as_deref().unwrap_or("-"),
                    "model process system event"
                );
            }
            RawEvent::Unrecognized(value) => {
                trace!(event = %value, "ignoring unrecognized raw event");
            }
        }
    }

    /// Stop consuming and queue a terminal error.
    fn fail(&mut self, failure: StreamFailure) {
        self.raw = None;
        self.pending.push_back(StreamEvent::Error(failure));
    }

    /// Raw stream ended cleanly: queue tool calls and the terminal event.
    fn finish(&mut self) {
        self.raw = None;

        if self.fragments.is_empty() {
            warn!(model = %self.config.model, "model produced no text");
            self.pending
                .push_back(StreamEvent::Error(StreamFailure::EmptyResponse));
            return;
        }

        let content = self.fragments.concat();
        let tool_calls = if self.config.tools_enabled {
            extract_tool_calls(&content)
        } else {
            Vec::new()
        };
        let finish_reason = if tool_calls.is_empty() {
            FinishReason::Stop
        } else {
            FinishReason::ToolCalls
        };

        debug!(
            model = %self.config.model,
            fragments = self.fragments.len(),
            chars = content.chars().count(),
            tool_calls = tool_calls.len(),
            finish_reason = %finish_reason,
            "stream finalized"
        );

        self.pending
            .extend(tool_calls.iter().cloned().map(StreamEvent::ToolCall));
        self.pending.push_back(StreamEvent::Done(Completion {
            content,
            finish_reason,
            tool_calls,
        }));
    }
}

impl StreamTranslator {
    pub fn new(config: TranslatorConfig) -> Self {
        Self { config }
    }

    /// Streaming mode. Dropping the returned stream drops the raw stream.
    pub fn translate(&self, raw: RawEventStream) -> BoxStream<'static, StreamEvent> {
        let state = TranslateState {
            raw: Some(raw),
            fragments: Vec::new(),
            pending: VecDeque::new(),
            config: self.config.clone(),
        };

        stream::unfold(state, |mut state| async move {
            loop {
                if let Some(event) = state.pending.pop_front() {
                    return Some((event, state));
                }

                let next = state.raw.as_mut()?.next().await;
                match next {
                    Some(Ok(event)) => state.absorb(event),
                    Some(Err(failure)) => state.fail(failure),
                    None => state.finish(),
                }
            }
        })
        .boxed()
    }

    /// Non-streaming mode: consume everything, then return the finalized
    /// completion.
    pub async fn collect(&self, raw: RawEventStream) -> Result<Completion> {
        self.collect_events(self.translate(raw)).await
    }

    /// Drains an already translated stream down to its terminal event.
    pub async fn collect_events(
        &self,
        mut events: BoxStream<'static, StreamEvent>,
    ) -> Result<Completion> {
        while let Some(event) = events.next().await {
            match event {
                StreamEvent::Done(completion) => return Ok(completion),
                StreamEvent::Error(failure) => return Err(AppError::from(failure)),
                StreamEvent::TextDelta(_) | StreamEvent::ToolCall(_) => {}
            }
        }
        Err(AppError::Internal(
            "translated stream ended without a terminal event".into(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn translator(tools_enabled: bool) -> StreamTranslator {
        StreamTranslator::new(TranslatorConfig {
            model: "test-model".into(),
            tools_enabled,
        })
    }

    fn raw(events: Vec<serde_json::Value>) -> RawEventStream {
        stream::iter(
            events
                .into_iter()
                .map(|value| Ok(RawEvent::from_value(value))),
        )
        .boxed()
    }

    fn direct(text: &str) -> serde_json::Value {
        json!({"content": [{"type": "text", "text": text}]})
    }

    async fn run(translator: &StreamTranslator, raw: RawEventStream) -> Vec<StreamEvent> {
        translator.translate(raw).collect().await
    }

    #[tokio::test]
    async fn test_three_direct_events_yield_three_deltas_and_stop() {
        let events = run(
            &translator(false),
            raw(vec![direct("Hel"), direct("lo, "), direct("world")]),
        )
        .await;

        assert_eq!(events.len(), 4);
        assert_eq!(events[0], StreamEvent::TextDelta("Hel".into()));
        assert_eq!(events[1], StreamEvent::TextDelta("lo, ".into()));
        assert_eq!(events[2], StreamEvent::TextDelta("world".into()));
        match &events[3] {
            StreamEvent::Done(completion) => {
                assert_eq!(completion.content, "Hello, world");
                assert_eq!(completion.finish_reason, FinishReason::Stop);
                assert!(completion.tool_calls.is_empty());
            }
            other => panic!("expected Done, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_mixed_shapes_and_empty_fragments() {
        let events = run(
            &translator(false),
            raw(vec![
                json!({"type": "system", "subtype": "init", "session_id": "abc"}),
                json!({"type": "assistant", "message": {"content": [
                    {"type": "text", "text": ""},
                    {"type": "text", "text": "A"}
                ]}}),
                json!({"type": "assistant", "message": {"content": "B"}}),
                json!({"content": [{"text": "C"}, "D"]}),
                json!({"type": "mystery"}),
                json!({"type": "result", "subtype": "success", "is_error": false}),
            ]),
        )
        .await;

        let deltas: Vec<&StreamEvent> = events
            .iter()
            .filter(|e| matches!(e, StreamEvent::TextDelta(_)))
            .collect();
        assert_eq!(deltas.len(), 4);
        assert_eq!(
            events.last().unwrap().finish_reason(),
            Some(FinishReason::Stop)
        );
    }

    #[tokio::test]
    async fn test_tool_marker_with_tools_enabled() {
        let text = r#"<tool_call>{"name": "lookup", "arguments": {"q": "moxie"}}</tool_call>"#;
        let events = run(&translator(true), raw(vec![direct(text)])).await;

        assert!(matches!(&events[1], StreamEvent::ToolCall(call) if call.function.name == "lookup"));
        match events.last().unwrap() {
            StreamEvent::Done(completion) => {
                assert_eq!(completion.finish_reason, FinishReason::ToolCalls);
                assert_eq!(completion.tool_calls.len(), 1);
            }
            other => panic!("expected Done, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_tool_marker_with_tools_disabled() {
        let text = r#"<tool_call>{"name": "lookup", "arguments": {}}</tool_call>"#;
        let completion = translator(false)
            .collect(raw(vec![direct(text)]))
            .await
            .unwrap();
        assert_eq!(completion.finish_reason, FinishReason::Stop);
        assert!(completion.tool_calls.is_empty());
    }

    #[tokio::test]
    async fn test_no_fragments_is_empty_response() {
        let events = run(&translator(false), raw(vec![json!({"type": "system"})])).await;
        assert_eq!(
            events,
            vec![StreamEvent::Error(StreamFailure::EmptyResponse)]
        );

        let err = translator(false).collect(raw(vec![])).await.unwrap_err();
        assert!(matches!(err, AppError::EmptyResponse));
    }

    #[tokio::test]
    async fn test_midstream_failure_keeps_deltas_and_ends_once() {
        let consumed = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&consumed);
        let items: Vec<std::result::Result<RawEvent, StreamFailure>> = vec![
            Ok(RawEvent::from_value(direct("partial"))),
            Err(StreamFailure::Upstream("process crashed".into())),
            Ok(RawEvent::from_value(direct("never seen"))),
        ];
        let raw = stream::iter(items)
            .inspect(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .boxed();

        let events = run(&translator(false), raw).await;
        assert_eq!(
            events,
            vec![
                StreamEvent::TextDelta("partial".into()),
                StreamEvent::Error(StreamFailure::Upstream("process crashed".into())),
            ]
        );
        assert_eq!(consumed.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_error_result_event_is_upstream_failure() {
        let err = translator(false)
            .collect(raw(vec![json!({
                "type": "result",
                "subtype": "error_during_execution",
                "is_error": true,
                "error_message": "rate limited"
            })]))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Upstream(msg) if msg == "rate limited"));
    }
}
