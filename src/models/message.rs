use serde::{Deserialize, Serialize};

/// 消息角色
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// 系统消息
    System,
    /// 用户消息
    User,
    /// 助手消息
    Assistant,
}

/// 工具调用中的函数描述
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionCall {
    /// 函数名称
    pub name: String,
    /// JSON 编码的参数
    pub arguments: String,
}

/// 工具调用记录
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    /// 调用 ID
    pub id: String,
    /// 调用类型，固定为 `function`
    #[serde(rename = "type")]
    pub call_type: String,
    /// 函数调用
    pub function: FunctionCall,
}

impl ToolCall {
    /// 创建函数类型的工具调用
    pub fn function(name: &str, arguments: String) -> Self {
        Self {
            id: format!("call_{}", uuid::Uuid::new_v4().simple()),
            call_type: "function".to_string(),
            function: FunctionCall {
                name: name.to_string(),
                arguments,
            },
        }
    }
}

/// 对话消息（会话中的一轮）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    /// 角色
    pub role: Role,
    /// 内容
    #[serde(default)]
    pub content: Option<String>,
    /// 工具调用
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: Some(content.into()),
            tool_calls: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// 文本内容，没有内容时为空串
    pub fn text(&self) -> &str {
        self.content.as_deref().unwrap_or_default()
    }
}
