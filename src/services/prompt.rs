//! 提示词构建
//!
//! 将 OpenAI 格式的消息列表转换为模型进程的提示词与系统提示词。

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::borrow::Cow;

use crate::models::message::{Message, Role};

/// 不支持内容的占位文本
pub const UNSUPPORTED_IMAGE: &str = "[Image: Content not supported by Claude Code]";

static IMAGE_REFERENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[Image:[^\]]*\]|data:image/[^;\s]*;base64,\S*").expect("image pattern is valid")
});

/// 构建结果
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    /// 对话提示词
    pub prompt: String,
    /// 系统提示词（最后一条 system 消息）
    pub system_prompt: Option<String>,
}

/// 提示词构建器
pub struct PromptBuilder;

impl PromptBuilder {
    /// 构建提示词
    ///
    /// `tools` 非空时，在系统提示词后追加工具调用约定说明。
    pub fn build(messages: &[Message], tools: Option<&[Value]>) -> Prompt {
        let mut system_prompt: Option<String> = None;
        let mut parts: Vec<String> = Vec::with_capacity(messages.len() + 1);

        for message in messages {
            let content = Self::filter_content(message.text()).into_owned();
            match message.role {
                Role::System => system_prompt = Some(content),
                Role::User => parts.push(format!("Human: {}", content)),
                Role::Assistant => {
                    let mut rendered = content;
                    for call in message.tool_calls.iter().flatten() {
                        if !rendered.is_empty() {
                            rendered.push('\n');
                        }
                        rendered.push_str(&format!(
                            "<tool_call>{{\"name\": {}, \"arguments\": {}}}</tool_call>",
                            Value::String(call.function.name.clone()),
                            call.function.arguments
                        ));
                    }
                    parts.push(format!("Assistant: {}", rendered));
                }
            }
        }

        if messages.last().is_some_and(|m| m.role != Role::User) {
            parts.push("Human: Please continue.".to_string());
        }

        if let Some(tools) = tools.filter(|t| !t.is_empty()) {
            let instructions = Self::tool_instructions(tools);
            system_prompt = Some(match system_prompt {
                Some(existing) => format!("{}\n\n{}", existing, instructions),
                None => instructions,
            });
        }

        Prompt {
            prompt: parts.join("\n\n"),
            system_prompt,
        }
    }

    /// 替换不支持的内容（图片引用与内联图片数据）
    pub fn filter_content(content: &str) -> Cow<'_, str> {
        IMAGE_REFERENCE.replace_all(content, UNSUPPORTED_IMAGE)
    }

    /// 估算 token 数（约 4 字符 / token）
    pub fn estimate_tokens(text: &str) -> u32 {
        (text.chars().count() / 4) as u32
    }

    /// 工具调用约定说明
    fn tool_instructions(tools: &[Value]) -> String {
        let mut out = String::from(
            "You can call the following tools. To call a tool, reply with one block per call in \
             exactly this form:\n<tool_call>{\"name\": \"<tool name>\", \"arguments\": {<JSON arguments>}}</tool_call>\n\nAvailable tools:",
        );

        for tool in tools {
            let function = tool.get("function").unwrap_or(tool);
            let Some(name) = function.get("name").and_then(Value::as_str) else {
                continue;
            };
            out.push_str(&format!("\n- {}", name));
            if let Some(description) = function.get("description").and_then(Value::as_str) {
                out.push_str(&format!(": {}", description));
            }
            if let Some(parameters) = function.get("parameters") {
                out.push_str(&format!("\n  parameters: {}", parameters));
            }
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::message::ToolCall;
    use serde_json::json;

    #[test]
    fn test_renders_turns_and_last_system_prompt() {
        let messages = vec![
            Message::system("first"),
            Message::user("Hi"),
            Message::assistant("Hello!"),
            Message::system("second"),
            Message::user("How are you?"),
        ];
        let prompt = PromptBuilder::build(&messages, None);
        assert_eq!(prompt.system_prompt.as_deref(), Some("second"));
        assert_eq!(
            prompt.prompt,
            "Human: Hi\n\nAssistant: Hello!\n\nHuman: How are you?"
        );
    }

    #[test]
    fn test_appends_continue_when_last_is_not_user() {
        let prompt = PromptBuilder::build(&[Message::user("Hi"), Message::assistant("Hey")], None);
        assert!(prompt.prompt.ends_with("Human: Please continue."));
    }

    #[test]
    fn test_filters_images() {
        let filtered = PromptBuilder::filter_content(
            "look [Image: cat.png] and data:image/png;base64,iVBORw0KGgo= please",
        );
        assert_eq!(
            filtered,
            format!("look {} and {} please", UNSUPPORTED_IMAGE, UNSUPPORTED_IMAGE)
        );
        assert_eq!(
            PromptBuilder::filter_content("[Image: x]"),
            "[Image: Content not supported by Claude Code]"
        );
    }

    #[test]
    fn test_estimate_tokens() {
        assert_eq!(PromptBuilder::estimate_tokens(""), 0);
        assert_eq!(PromptBuilder::estimate_tokens("abcdefgh"), 2);
    }

    #[test]
    fn test_tool_instructions_are_appended() {
        let tools = vec![json!({
            "type": "function",
            "function": {"name": "get_weather", "description": "Weather by city", "parameters": {"type": "object"}}
        })];
        let prompt = PromptBuilder::build(&[Message::system("sys"), Message::user("Hi")], Some(&tools));
        let system = prompt.system_prompt.unwrap();
        assert!(system.starts_with("sys\n\n"));
        assert!(system.contains("<tool_call>"));
        assert!(system.contains("- get_weather: Weather by city"));
    }

    #[test]
    fn test_assistant_tool_calls_render_as_markers() {
        let mut assistant = Message::assistant("");
        assistant.content = None;
        assistant.tool_calls = Some(vec![ToolCall::function("ping", "{}".into())]);
        let prompt = PromptBuilder::build(&[Message::user("go"), assistant, Message::user("ok")], None);
        assert!(prompt
            .prompt
            .contains("Assistant: <tool_call>{\"name\": \"ping\", \"arguments\": {}}</tool_call>"));
    }
}
