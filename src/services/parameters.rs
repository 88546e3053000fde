//! 执行参数映射
//!
//! 将 OpenAI 请求参数与 `X-Claude-*` 请求头映射为模型执行参数，并生成兼容性报告。

use axum::http::HeaderMap;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::models::chat::{ChatCompletionRequest, SUPPORTED_MODELS};
use crate::services::executor::{ExecutionRequest, PermissionMode};
use crate::services::prompt::Prompt;

/// 禁用工具时传给模型进程的工具列表
pub const DISABLED_TOOLS: &[&str] = &[
    "Task",
    "Bash",
    "Glob",
    "Grep",
    "LS",
    "exit_plan_mode",
    "Read",
    "Edit",
    "MultiEdit",
    "Write",
    "NotebookRead",
    "NotebookEdit",
    "WebFetch",
    "TodoRead",
    "TodoWrite",
    "WebSearch",
];

/// 支持的自定义请求头
pub const CUSTOM_HEADERS: &[&str] = &[
    "X-Claude-Max-Turns",
    "X-Claude-Allowed-Tools",
    "X-Claude-Disallowed-Tools",
    "X-Claude-Permission-Mode",
    "X-Claude-Max-Thinking-Tokens",
];

/// 模型进程支持的执行选项
pub const EXECUTION_OPTIONS: &[&str] = &[
    "model",
    "system_prompt",
    "max_turns",
    "allowed_tools",
    "disallowed_tools",
    "permission_mode",
    "max_thinking_tokens",
];

/// 从请求头解析出的执行参数覆盖
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HeaderOverrides {
    pub max_turns: Option<u32>,
    pub allowed_tools: Option<Vec<String>>,
    pub disallowed_tools: Option<Vec<String>>,
    pub permission_mode: Option<PermissionMode>,
    pub max_thinking_tokens: Option<u32>,
}

impl HeaderOverrides {
    /// 解析请求头；非法值记录日志后忽略
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let get = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
        };

        let max_turns = get("x-claude-max-turns").and_then(|raw| match raw.parse::<u32>() {
            Ok(turns) => {
                if !(1..=100).contains(&turns) {
                    warn!(max_turns = turns, "max_turns is outside recommended range (1-100)");
                }
                Some(turns)
            }
            Err(_) => {
                warn!(value = raw, "invalid X-Claude-Max-Turns header");
                None
            }
        });

        let max_thinking_tokens =
            get("x-claude-max-thinking-tokens").and_then(|raw| match raw.parse::<u32>() {
                Ok(tokens) => {
                    if tokens > 50_000 {
                        warn!(
                            max_thinking_tokens = tokens,
                            "max_thinking_tokens is outside recommended range (0-50000)"
                        );
                    }
                    Some(tokens)
                }
                Err(_) => {
                    warn!(value = raw, "invalid X-Claude-Max-Thinking-Tokens header");
                    None
                }
            });

        let permission_mode =
            get("x-claude-permission-mode").and_then(|raw| match raw.parse::<PermissionMode>() {
                Ok(mode) => Some(mode),
                Err(e) => {
                    error!(error = %e, "invalid X-Claude-Permission-Mode header");
                    None
                }
            });

        Self {
            max_turns,
            allowed_tools: get("x-claude-allowed-tools").and_then(parse_tool_list),
            disallowed_tools: get("x-claude-disallowed-tools").and_then(parse_tool_list),
            permission_mode,
            max_thinking_tokens,
        }
    }
}

fn parse_tool_list(raw: &str) -> Option<Vec<String>> {
    let tools: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|tool| !tool.is_empty())
        .map(str::to_string)
        .collect();
    if tools.is_empty() { None } else { Some(tools) }
}

/// 校验模型是否受支持（仅告警）
pub fn validate_model(model: &str) -> bool {
    let supported = SUPPORTED_MODELS.contains(&model);
    if !supported {
        warn!(model, "model may not be supported by the model process");
    }
    supported
}

/// 组装执行请求
///
/// 禁用工具时固定传入 [`DISABLED_TOOLS`] 并将轮次限制为 1。
pub fn build_execution(
    request: &ChatCompletionRequest,
    prompt: Prompt,
    overrides: &HeaderOverrides,
    default_max_turns: u32,
) -> ExecutionRequest {
    validate_model(&request.model);

    let mut execution = ExecutionRequest {
        prompt: prompt.prompt,
        system_prompt: prompt.system_prompt,
        model: Some(request.model.clone()),
        max_turns: overrides.max_turns.unwrap_or(default_max_turns),
        allowed_tools: None,
        disallowed_tools: None,
        permission_mode: overrides.permission_mode,
        max_thinking_tokens: overrides.max_thinking_tokens,
        stream: request.stream,
    };

    if request.tools_enabled() {
        execution.allowed_tools = overrides.allowed_tools.clone();
        execution.disallowed_tools = overrides.disallowed_tools.clone();
        info!(
            allowed = ?execution.allowed_tools,
            disallowed = ?execution.disallowed_tools,
            "tools enabled"
        );
    } else {
        execution.disallowed_tools = Some(DISABLED_TOOLS.iter().map(|t| t.to_string()).collect());
        execution.max_turns = 1;
        info!("tools disabled");
    }

    execution
}

/// 兼容性报告
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct CompatibilityReport {
    pub supported_parameters: Vec<String>,
    pub unsupported_parameters: Vec<String>,
    pub warnings: Vec<String>,
    pub suggestions: Vec<String>,
}

/// 生成请求的兼容性报告
pub fn compatibility_report(request: &ChatCompletionRequest) -> CompatibilityReport {
    let mut report = CompatibilityReport::default();
    let unsupported = |report: &mut CompatibilityReport, params: &[&str], suggestion: &str| {
        report
            .unsupported_parameters
            .extend(params.iter().map(|p| p.to_string()));
        report.suggestions.push(suggestion.to_string());
    };

    report.supported_parameters.push("model".into());
    if !request.messages.is_empty() {
        report.supported_parameters.push("messages".into());
    }
    report.supported_parameters.push("stream".into());
    if request.user.is_some() {
        report.supported_parameters.push("user (for logging)".into());
    }
    if request.session_id.is_some() {
        report.supported_parameters.push("session_id".into());
    }

    if !SUPPORTED_MODELS.contains(&request.model.as_str()) {
        report
            .warnings
            .push(format!("model '{}' may not be supported", request.model));
    }

    if request.temperature != 1.0 {
        unsupported(
            &mut report,
            &["temperature"],
            "Temperature control is not supported. Consider different models for varied response styles.",
        );
    }
    if request.top_p != 1.0 {
        unsupported(
            &mut report,
            &["top_p"],
            "top_p is not supported and will be ignored.",
        );
    }
    if request.max_tokens.is_some() {
        unsupported(
            &mut report,
            &["max_tokens"],
            "Use X-Claude-Max-Turns to limit conversation length, or X-Claude-Max-Thinking-Tokens to limit internal reasoning.",
        );
    }
    if request.n > 1 {
        unsupported(
            &mut report,
            &["n"],
            "Only single responses (n=1) are supported. Make separate requests for multiple variations.",
        );
    }
    if request.stop.is_some() {
        unsupported(
            &mut report,
            &["stop"],
            "Stop sequences are not supported. Post-process responses or limit turns instead.",
        );
    }
    if request.presence_penalty != 0.0 || request.frequency_penalty != 0.0 {
        unsupported(
            &mut report,
            &["presence_penalty", "frequency_penalty"],
            "Penalty parameters are not supported. Use system prompts to encourage varied responses.",
        );
    }
    if request.logit_bias.as_ref().is_some_and(|bias| !bias.is_empty()) {
        unsupported(
            &mut report,
            &["logit_bias"],
            "Logit bias is not supported. Use system prompts to guide response style.",
        );
    }

    report
}
