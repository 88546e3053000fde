//! 聊天补全请求模型
//!
//! 兼容 OpenAI Chat Completions 请求格式，并附带会话与工具扩展字段。

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{AppError, Result};
use crate::models::message::Message;

/// 默认模型
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

/// 支持的模型列表
pub const SUPPORTED_MODELS: &[&str] = &[
    "claude-sonnet-4-20250514",
    "claude-opus-4-20250514",
    "claude-3-7-sonnet-20250219",
    "claude-3-5-sonnet-20241022",
    "claude-3-5-haiku-20241022",
];

/// 聊天补全请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionRequest {
    /// 模型 ID
    #[serde(default = "default_model")]
    pub model: String,

    /// 消息列表
    pub messages: Vec<Message>,

    /// 采样温度（不支持，仅校验范围）
    #[serde(default = "default_one")]
    pub temperature: f32,

    /// nucleus 采样（不支持，仅校验范围）
    #[serde(default = "default_one")]
    pub top_p: f32,

    /// 候选数量，仅支持 1
    #[serde(default = "default_n")]
    pub n: u32,

    /// 是否流式返回
    #[serde(default)]
    pub stream: bool,

    /// 停止序列（不支持）
    #[serde(default)]
    pub stop: Option<serde_json::Value>,

    /// 最大 token 数（不支持）
    #[serde(default)]
    pub max_tokens: Option<u32>,

    #[serde(default)]
    pub presence_penalty: f32,

    #[serde(default)]
    pub frequency_penalty: f32,

    #[serde(default)]
    pub logit_bias: Option<HashMap<String, f32>>,

    /// 调用方标识（仅用于日志）
    #[serde(default)]
    pub user: Option<String>,

    /// 会话 ID，缺省时为无状态模式
    #[serde(default)]
    pub session_id: Option<String>,

    /// 是否启用工具
    #[serde(default)]
    pub enable_tools: bool,

    /// OpenAI 工具定义
    #[serde(default)]
    pub tools: Option<Vec<serde_json::Value>>,
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_one() -> f32 {
    1.0
}

fn default_n() -> u32 {
    1
}

impl ChatCompletionRequest {
    /// 使用默认参数创建请求
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            model: default_model(),
            messages,
            temperature: 1.0,
            top_p: 1.0,
            n: 1,
            stream: false,
            stop: None,
            max_tokens: None,
            presence_penalty: 0.0,
            frequency_penalty: 0.0,
            logit_bias: None,
            user: None,
            session_id: None,
            enable_tools: false,
            tools: None,
        }
    }

    /// 是否启用工具（显式开关或携带了工具定义）
    pub fn tools_enabled(&self) -> bool {
        self.enable_tools || self.tools.as_ref().is_some_and(|tools| !tools.is_empty())
    }

    /// 校验请求参数
    pub fn validate(&self) -> Result<()> {
        if self.messages.is_empty() {
            return Err(AppError::Validation("messages must not be empty".into()));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(AppError::Validation(
                "temperature must be between 0 and 2".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.top_p) {
            return Err(AppError::Validation("top_p must be between 0 and 1".into()));
        }
        if self.n != 1 {
            return Err(AppError::Validation(
                "only n=1 is supported; make separate requests for more choices".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_minimal_request_defaults() {
        let request: ChatCompletionRequest =
            serde_json::from_str(r#"{"messages":[{"role":"user","content":"Hi"}]}"#).unwrap();
        assert_eq!(request.model, DEFAULT_MODEL);
        assert_eq!(request.n, 1);
        assert!(!request.stream);
        assert!(!request.tools_enabled());
        assert!(request.validate().is_ok());
    }

    #[rstest]
    #[case(2.5, 1.0, 1)]
    #[case(-0.1, 1.0, 1)]
    #[case(1.0, 1.5, 1)]
    #[case(1.0, 1.0, 2)]
    fn test_validation_rejects(#[case] temperature: f32, #[case] top_p: f32, #[case] n: u32) {
        let mut request = ChatCompletionRequest::new(vec![Message::user("Hi")]);
        request.temperature = temperature;
        request.top_p = top_p;
        request.n = n;
        assert!(matches!(request.validate(), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_empty_messages_rejected() {
        let request = ChatCompletionRequest::new(vec![]);
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_tools_enable_tooling() {
        let mut request = ChatCompletionRequest::new(vec![Message::user("Hi")]);
        request.tools = Some(vec![serde_json::json!({"type": "function"})]);
        assert!(request.tools_enabled());
    }
}
