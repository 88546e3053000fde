//! In-process executor that replays a fixed script of raw events.
//!
//! Used for tests and for running the gateway without a model CLI.

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::Result;
use crate::models::stream::{RawEvent, RawEventStream, StreamFailure};
use crate::services::executor::{ExecutionRequest, ModelExecutor};

/// Sets the flag when the replay stream is dropped.
struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// Replays the same raw events on every run.
pub struct ScriptedExecutor {
    script: Vec<std::result::Result<Value, StreamFailure>>,
    hang_after_script: bool,
    requests: Mutex<Vec<ExecutionRequest>>,
    dropped: Arc<AtomicBool>,
}

impl ScriptedExecutor {
    pub fn new(script: Vec<std::result::Result<Value, StreamFailure>>) -> Self {
        Self {
            script,
            hang_after_script: false,
            requests: Mutex::new(Vec::new()),
            dropped: Arc::new(AtomicBool::new(false)),
        }
    }

    /// One assistant-message event per fragment.
    pub fn replying(fragments: &[&str]) -> Self {
        Self::new(
            fragments
                .iter()
                .map(|text| {
                    Ok(json!({
                        "type": "assistant",
                        "message": {"content": [{"type": "text", "text": text}]}
                    }))
                })
                .collect(),
        )
    }

    /// Never end the stream after the script; only a drop stops it.
    pub fn hanging(mut self) -> Self {
        self.hang_after_script = true;
        self
    }

    /// Requests received so far.
    pub fn requests(&self) -> Vec<ExecutionRequest> {
        self.requests.lock().clone()
    }

    /// Whether the most recent replay stream has been dropped.
    pub fn stream_dropped(&self) -> bool {
        self.dropped.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModelExecutor for ScriptedExecutor {
    async fn execute(&self, request: ExecutionRequest) -> Result<RawEventStream> {
        self.requests.lock().push(request);
        self.dropped.store(false, Ordering::SeqCst);

        let guard = DropFlag(Arc::clone(&self.dropped));
        let items: Vec<std::result::Result<RawEvent, StreamFailure>> = self
            .script
            .iter()
            .cloned()
            .map(|item| item.map(RawEvent::from_value))
            .collect();

        let replay = stream::iter(items);
        let events = if self.hang_after_script {
            replay.chain(stream::pending()).boxed()
        } else {
            replay.boxed()
        };

        Ok(events
            .map(move |item| {
                let _alive = &guard;
                item
            })
            .boxed())
    }

    async fn verify(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_replays_script_and_records_requests() {
        let executor = ScriptedExecutor::replying(&["a", "b"]);
        let events: Vec<_> = executor
            .execute(ExecutionRequest::new("hi"))
            .await
            .unwrap()
            .collect()
            .await;

        assert_eq!(events.len(), 2);
        assert_eq!(executor.requests()[0].prompt, "hi");
        assert!(executor.stream_dropped());
    }
}
