//! Handlers 模块
//!
//! HTTP 请求处理程序。

pub mod chat_handler;
pub mod moxie_handler;
pub mod session_handler;

pub use chat_handler::*;
pub use moxie_handler::*;
pub use session_handler::*;

use axum::{Json, extract::rejection::JsonRejection};

use crate::error::AppError;

/// 请求体解析失败时返回 OpenAI 风格的 400 错误
pub(crate) fn parse_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    body.map(|Json(value)| value)
        .map_err(|rejection| AppError::Validation(rejection.body_text()))
}
