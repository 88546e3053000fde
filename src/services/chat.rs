//! 聊天补全服务
//!
//! 单次请求流程：会话合并历史 → 构建提示词 → 模型进程执行 → 流转换 →
//! （非流式且启用 Moxie 时）响应增强 → 追加助手轮次。
//! 会话中保存的是增强前的原始文本。

use futures_util::stream::{BoxStream, StreamExt};
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::config::MoxieConfig;
use crate::error::Result;
use crate::models::chat::ChatCompletionRequest;
use crate::models::message::Message;
use crate::models::stream::{Completion, StreamEvent};
use crate::services::executor::ModelExecutor;
use crate::services::moxie::{EnhancedResponse, ResponseEnhancer};
use crate::services::parameters::{HeaderOverrides, build_execution};
use crate::services::prompt::PromptBuilder;
use crate::services::session::SessionStore;
use crate::services::translator::{StreamTranslator, TranslatorConfig};

/// 非流式补全结果
#[derive(Debug, Clone)]
pub struct ChatReply {
    /// 使用的会话 ID
    pub session_id: Option<String>,
    /// 最终返回给客户端的消息内容（Moxie 模式下为设备标记文本）
    pub content: String,
    /// 转换后的补全结果（原始文本）
    pub completion: Completion,
    /// Moxie 增强结果
    pub moxie: Option<EnhancedResponse>,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

/// 流式补全结果
pub struct ChatStream {
    pub session_id: Option<String>,
    pub events: BoxStream<'static, StreamEvent>,
}

/// 聊天补全服务
pub struct ChatService {
    sessions: Arc<SessionStore>,
    executor: Arc<dyn ModelExecutor>,
    enhancer: Arc<ResponseEnhancer>,
    moxie: MoxieConfig,
    default_max_turns: u32,
}

struct Prepared {
    translator: StreamTranslator,
    session_id: Option<String>,
    prompt_tokens: u32,
    events: BoxStream<'static, StreamEvent>,
}

impl ChatService {
    pub fn new(
        sessions: Arc<SessionStore>,
        executor: Arc<dyn ModelExecutor>,
        enhancer: Arc<ResponseEnhancer>,
        moxie: MoxieConfig,
        default_max_turns: u32,
    ) -> Self {
        Self {
            sessions,
            executor,
            enhancer,
            moxie,
            default_max_turns,
        }
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    pub fn enhancer(&self) -> &Arc<ResponseEnhancer> {
        &self.enhancer
    }

    pub fn moxie(&self) -> &MoxieConfig {
        &self.moxie
    }

    async fn prepare(
        &self,
        request: &ChatCompletionRequest,
        overrides: &HeaderOverrides,
    ) -> Result<Prepared> {
        request.validate()?;

        let (messages, session_id) = self
            .sessions
            .resolve_and_extend(request.messages.clone(), request.session_id.as_deref());

        let prompt = PromptBuilder::build(&messages, request.tools.as_deref());
        let prompt_tokens = PromptBuilder::estimate_tokens(&prompt.prompt);
        let execution = build_execution(request, prompt, overrides, self.default_max_turns);

        let translator = StreamTranslator::new(TranslatorConfig {
            model: request.model.clone(),
            tools_enabled: request.tools_enabled(),
        });

        info!(
            model = %request.model,
            session_id = session_id.as_deref().unwrap_or("-"),
            messages = messages.len(),
            stream = request.stream,
            "chat completion started"
        );

        let raw = self.executor.execute(execution).await?;
        let events = translator.translate(raw);

        Ok(Prepared {
            translator,
            session_id,
            prompt_tokens,
            events,
        })
    }

    /// 流式补全
    ///
    /// 只有在终止事件为 `Done` 时才追加助手轮次；流被提前丢弃（客户端断开）时不追加。
    pub async fn stream(
        &self,
        request: &ChatCompletionRequest,
        overrides: &HeaderOverrides,
    ) -> Result<ChatStream> {
        let prepared = self.prepare(request, overrides).await?;
        let session_id = prepared.session_id.clone();

        let events = match prepared.session_id {
            Some(id) => {
                let sessions = self.sessions.clone();
                prepared
                    .events
                    .inspect(move |event| {
                        if let StreamEvent::Done(completion) = event {
                            sessions.append_assistant_turn(&id, assistant_turn(completion));
                        }
                    })
                    .boxed()
            }
            None => prepared.events,
        };

        Ok(ChatStream { session_id, events })
    }

    /// 非流式补全
    pub async fn complete(
        &self,
        request: &ChatCompletionRequest,
        overrides: &HeaderOverrides,
    ) -> Result<ChatReply> {
        let Prepared {
            translator,
            session_id,
            prompt_tokens,
            events,
        } = self.prepare(request, overrides).await?;

        let completion = translator.collect_events(events).await?;

        if let Some(id) = session_id.as_deref() {
            self.sessions
                .append_assistant_turn(id, assistant_turn(&completion));
        }

        let moxie = self
            .moxie
            .enabled
            .then(|| self.enhancer.enhance(&completion.content, self.moxie.speech_direction));
        let content = match &moxie {
            Some(enhanced) => {
                debug!(emotion = %enhanced.emotion, commands = ?enhanced.commands, "response enhanced");
                enhanced.markup.clone()
            }
            None => completion.content.clone(),
        };

        Ok(ChatReply {
            session_id,
            completion_tokens: PromptBuilder::estimate_tokens(&completion.content),
            content,
            completion,
            moxie,
            prompt_tokens,
        })
    }
}

/// 由补全结果构造待保存的助手消息
fn assistant_turn(completion: &Completion) -> Message {
    let mut message = Message::assistant(completion.content.clone());
    if !completion.tool_calls.is_empty() {
        message.tool_calls = Some(completion.tool_calls.clone());
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::config::SessionSettings;
    use crate::error::AppError;
    use crate::models::message::Role;
    use crate::models::stream::{FinishReason, StreamFailure};
    use crate::services::executor::ScriptedExecutor;
    use crate::services::moxie::{EmotionClassifier, EmotionTable};
    use serde_json::json;

    fn moxie(enabled: bool) -> MoxieConfig {
        MoxieConfig {
            enabled,
            emotion_detection: true,
            speech_direction: false,
            emotion_table: None,
        }
    }

    fn service(executor: Arc<ScriptedExecutor>, moxie_enabled: bool) -> ChatService {
        let sessions = Arc::new(SessionStore::in_memory(&SessionSettings {
            ttl_secs: 3600,
            cleanup_interval_secs: 300,
        }));
        let classifier = Arc::new(EmotionClassifier::new(EmotionTable::default()).unwrap());
        ChatService::new(
            sessions,
            executor,
            Arc::new(ResponseEnhancer::new(classifier, true)),
            moxie(moxie_enabled),
            10,
        )
    }

    fn request(session_id: Option<&str>, messages: Vec<Message>) -> ChatCompletionRequest {
        let mut request = ChatCompletionRequest::new(messages);
        request.session_id = session_id.map(str::to_string);
        request
    }

    #[tokio::test]
    async fn test_session_round_trip() {
        let executor = Arc::new(ScriptedExecutor::replying(&["Hello!"]));
        let service = service(executor.clone(), false);

        let reply = service
            .complete(
                &request(Some("s1"), vec![Message::user("Hi")]),
                &HeaderOverrides::default(),
            )
            .await
            .unwrap();
        assert_eq!(reply.content, "Hello!");
        assert_eq!(reply.session_id.as_deref(), Some("s1"));

        let history = service.sessions().get("s1").unwrap().messages;
        assert_eq!(history.len(), 2);
        assert_eq!(history[1], Message::assistant("Hello!"));

        service
            .complete(
                &request(Some("s1"), vec![Message::user("How are you?")]),
                &HeaderOverrides::default(),
            )
            .await
            .unwrap();
        let prompt = &executor.requests()[1].prompt;
        assert_eq!(prompt, "Human: Hi\n\nAssistant: Hello!\n\nHuman: How are you?");
        assert_eq!(service.sessions().get("s1").unwrap().messages.len(), 4);
    }

    #[tokio::test]
    async fn test_moxie_markup_keeps_raw_text_in_session() {
        let executor = Arc::new(ScriptedExecutor::replying(&[
            "I'm so happy!! ",
            "This is wonderful and amazing!!",
        ]));
        let service = service(executor, true);

        let reply = service
            .complete(
                &request(Some("m1"), vec![Message::user("Hi")]),
                &HeaderOverrides::default(),
            )
            .await
            .unwrap();
        assert!(reply.content.starts_with("<cmd:animate:joy>\n"));
        assert_eq!(reply.moxie.unwrap().emotion, "happy");

        let stored = service.sessions().get("m1").unwrap().messages;
        assert_eq!(
            stored[1].text(),
            "I'm so happy!! This is wonderful and amazing!!"
        );
    }

    #[tokio::test]
    async fn test_stream_appends_on_done() {
        let executor = Arc::new(ScriptedExecutor::replying(&["Hel", "lo"]));
        let service = service(executor, false);
        let mut req = request(Some("st"), vec![Message::user("Hi")]);
        req.stream = true;

        let chat = service.stream(&req, &HeaderOverrides::default()).await.unwrap();
        let events: Vec<StreamEvent> = chat.events.collect().await;
        assert_eq!(events.len(), 3);
        assert_eq!(events[2].finish_reason(), Some(FinishReason::Stop));

        let stored = service.sessions().get("st").unwrap().messages;
        assert_eq!(stored.last().map(|m| m.role), Some(Role::Assistant));
        assert_eq!(stored.last().unwrap().text(), "Hello");
    }

    #[tokio::test]
    async fn test_dropped_stream_appends_nothing() {
        let executor = Arc::new(ScriptedExecutor::replying(&["partial"]).hanging());
        let service = service(executor.clone(), false);

        let mut chat = service
            .stream(
                &request(Some("d1"), vec![Message::user("Hi")]),
                &HeaderOverrides::default(),
            )
            .await
            .unwrap();
        assert!(matches!(chat.events.next().await, Some(StreamEvent::TextDelta(_))));
        drop(chat);

        assert!(executor.stream_dropped());
        assert_eq!(service.sessions().get("d1").unwrap().messages.len(), 1);
    }

    #[tokio::test]
    async fn test_upstream_failure_is_request_error() {
        let executor = Arc::new(ScriptedExecutor::new(vec![
            Ok(json!({"content": [{"type": "text", "text": "a"}]})),
            Err(StreamFailure::Upstream("boom".into())),
        ]));
        let service = service(executor, false);

        let result = service
            .complete(
                &request(Some("e1"), vec![Message::user("Hi")]),
                &HeaderOverrides::default(),
            )
            .await;
        assert!(matches!(result, Err(AppError::Upstream(_))));
        assert_eq!(service.sessions().get("e1").unwrap().messages.len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_request_never_reaches_executor() {
        let executor = Arc::new(ScriptedExecutor::replying(&["x"]));
        let service = service(executor.clone(), false);
        let result = service
            .complete(&request(None, Vec::new()), &HeaderOverrides::default())
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
        assert!(executor.requests().is_empty());
    }
}
