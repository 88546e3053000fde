//! Chat DTOs
//!
//! OpenAI 兼容的聊天补全响应与流式分块。

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;

use crate::models::chat::SUPPORTED_MODELS;
use crate::models::message::{Message, Role, ToolCall};
use crate::models::stream::FinishReason;
use crate::services::moxie::SpeechDirection;
use crate::services::parameters::{CUSTOM_HEADERS, CompatibilityReport, EXECUTION_OPTIONS};

/// 生成补全 ID
pub fn completion_id() -> String {
    format!("chatcmpl-{}", uuid::Uuid::new_v4().simple())
}

/// token 用量（按字符数估算）
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl Usage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Choice {
    pub index: u32,
    pub message: Message,
    pub finish_reason: FinishReason,
}

/// Moxie 元数据
#[derive(Debug, Clone, Serialize)]
pub struct MoxieMetadata {
    pub emotion: String,
    pub commands: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speech: Option<SpeechDirection>,
}

/// 非流式补全响应
#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionResponse {
    pub id: String,
    pub object: &'static str,
    pub created: i64,
    pub model: String,
    pub choices: Vec<Choice>,
    pub usage: Usage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub moxie: Option<MoxieMetadata>,
}

impl ChatCompletionResponse {
    pub fn new(id: String, model: String, choice: Choice, usage: Usage) -> Self {
        Self {
            id,
            object: "chat.completion",
            created: Utc::now().timestamp(),
            model,
            choices: vec![choice],
            usage,
            session_id: None,
            moxie: None,
        }
    }
}

/// 流式增量
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct Delta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallDelta>>,
}

/// 流式工具调用增量
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ToolCallDelta {
    pub index: u32,
    #[serde(flatten)]
    pub call: ToolCall,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChunkChoice {
    pub index: u32,
    pub delta: Delta,
    /// 非终止分块中为 `null`
    pub finish_reason: Option<FinishReason>,
}

/// 流式分块
#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionChunk {
    pub id: String,
    pub object: &'static str,
    pub created: i64,
    pub model: String,
    pub choices: Vec<ChunkChoice>,
}

impl ChatCompletionChunk {
    fn new(id: &str, model: &str, delta: Delta, finish_reason: Option<FinishReason>) -> Self {
        Self {
            id: id.to_string(),
            object: "chat.completion.chunk",
            created: Utc::now().timestamp(),
            model: model.to_string(),
            choices: vec![ChunkChoice {
                index: 0,
                delta,
                finish_reason,
            }],
        }
    }

    /// 文本增量分块；第一个分块携带 `role`
    pub fn content(id: &str, model: &str, text: String, first: bool) -> Self {
        Self::new(
            id,
            model,
            Delta {
                role: first.then_some(Role::Assistant),
                content: Some(text),
                tool_calls: None,
            },
            None,
        )
    }

    pub fn tool_call(id: &str, model: &str, index: u32, call: ToolCall) -> Self {
        Self::new(
            id,
            model,
            Delta {
                tool_calls: Some(vec![ToolCallDelta { index, call }]),
                ..Default::default()
            },
            None,
        )
    }

    /// 终止分块：空增量，非空结束原因
    pub fn finish(id: &str, model: &str, finish_reason: FinishReason) -> Self {
        Self::new(id, model, Delta::default(), Some(finish_reason))
    }
}

/// 模型信息
#[derive(Debug, Clone, Serialize)]
pub struct ModelInfo {
    pub id: String,
    pub object: &'static str,
    pub owned_by: &'static str,
}

/// 模型列表响应
#[derive(Debug, Clone, Serialize)]
pub struct ModelListResponse {
    pub object: &'static str,
    pub data: Vec<ModelInfo>,
}

impl ModelListResponse {
    pub fn supported() -> Self {
        Self {
            object: "list",
            data: SUPPORTED_MODELS
                .iter()
                .map(|id| ModelInfo {
                    id: id.to_string(),
                    object: "model",
                    owned_by: "anthropic",
                })
                .collect(),
        }
    }
}

/// 兼容性检查响应
#[derive(Debug, Clone, Serialize)]
pub struct CompatibilityResponse {
    pub compatibility_report: CompatibilityReport,
    pub execution_options: ExecutionOptions,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExecutionOptions {
    pub supported: Vec<&'static str>,
    pub custom_headers: Vec<&'static str>,
}

impl CompatibilityResponse {
    pub fn new(report: CompatibilityReport) -> Self {
        Self {
            compatibility_report: report,
            execution_options: ExecutionOptions {
                supported: EXECUTION_OPTIONS.to_vec(),
                custom_headers: CUSTOM_HEADERS.to_vec(),
            },
        }
    }
}

/// 流式中途出错时发送的错误帧
pub fn stream_error_payload(message: &str, code: &str) -> Value {
    serde_json::json!({
        "error": {
            "message": message,
            "type": "streaming_error",
            "code": code,
        }
    })
}
