//! Model execution.
//!
//! The gateway hands an assembled prompt plus execution parameters to a
//! [`ModelExecutor`] and receives an async sequence of raw events back.

pub mod cli;
pub mod scripted;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Result;
use crate::models::stream::RawEventStream;

pub use cli::CliExecutor;
pub use scripted::ScriptedExecutor;

/// Tool permission mode passed through to the model process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PermissionMode {
    Default,
    AcceptEdits,
    BypassPermissions,
}

impl PermissionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PermissionMode::Default => "default",
            PermissionMode::AcceptEdits => "acceptEdits",
            PermissionMode::BypassPermissions => "bypassPermissions",
        }
    }
}

impl fmt::Display for PermissionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PermissionMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "default" => Ok(PermissionMode::Default),
            "acceptEdits" => Ok(PermissionMode::AcceptEdits),
            "bypassPermissions" => Ok(PermissionMode::BypassPermissions),
            other => Err(format!(
                "invalid permission mode '{}', expected one of default, acceptEdits, bypassPermissions",
                other
            )),
        }
    }
}

/// Everything the model process needs for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionRequest {
    pub prompt: String,
    pub system_prompt: Option<String>,
    pub model: Option<String>,
    pub max_turns: u32,
    pub allowed_tools: Option<Vec<String>>,
    pub disallowed_tools: Option<Vec<String>>,
    pub permission_mode: Option<PermissionMode>,
    pub max_thinking_tokens: Option<u32>,
    pub stream: bool,
}

impl ExecutionRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system_prompt: None,
            model: None,
            max_turns: 1,
            allowed_tools: None,
            disallowed_tools: None,
            permission_mode: None,
            max_thinking_tokens: None,
            stream: true,
        }
    }
}

/// External model-execution collaborator.
#[async_trait]
pub trait ModelExecutor: Send + Sync {
    /// Start a run. Errors here mean the run could not start at all;
    /// failures after that arrive as error items on the stream.
    async fn execute(&self, request: ExecutionRequest) -> Result<RawEventStream>;

    /// Probe that the executor works. Never fails the caller.
    async fn verify(&self) -> bool;
}
