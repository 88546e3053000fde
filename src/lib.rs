//! Moxie Gateway - OpenAI 兼容的聊天网关
//!
//! 将 Chat Completions 请求转交给本地模型 CLI，维护多轮会话，
//! 并为 Moxie 陪伴设备提供情绪标注、用户识别与个性化交互设置。

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod observability;
pub mod security;
pub mod services;
pub mod storage;
