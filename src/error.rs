//! 错误处理模块
//!
//! 定义应用程序的错误类型，以及 OpenAI 风格的错误响应格式。

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 应用程序错误类型
#[derive(Error, Debug)]
pub enum AppError {
    /// 认证错误
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// 资源不存在
    #[error("{0}")]
    NotFound(String),

    /// 参数验证错误
    #[error("invalid request: {0}")]
    Validation(String),

    /// 模型执行进程失败
    #[error("model execution failed: {0}")]
    Upstream(String),

    /// 模型执行成功但没有产出任何文本
    #[error("no response produced by the model")]
    EmptyResponse,

    /// 超时错误
    #[error("operation timed out: {0}")]
    Timeout(String),

    /// 配置错误
    #[error("configuration error: {0}")]
    Config(String),

    /// 持久化存储错误
    #[error("storage error: {0}")]
    Storage(String),

    /// 序列化错误
    #[error("serialization error: {0}")]
    Serialization(String),

    /// IO 错误
    #[error("io error: {0}")]
    Io(String),

    /// 内部错误
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        AppError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        AppError::Serialization(e.to_string())
    }
}

impl From<figment::Error> for AppError {
    fn from(e: figment::Error) -> Self {
        AppError::Config(e.to_string())
    }
}

impl From<crate::models::stream::StreamFailure> for AppError {
    fn from(e: crate::models::stream::StreamFailure) -> Self {
        use crate::models::stream::StreamFailure;
        match e {
            StreamFailure::Upstream(message) => AppError::Upstream(message),
            StreamFailure::EmptyResponse => AppError::EmptyResponse,
            StreamFailure::Timeout(idle) => {
                AppError::Timeout(format!("model produced no output for {:?}", idle))
            }
        }
    }
}

impl AppError {
    /// HTTP 状态码与错误类型映射
    pub fn status_and_type(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, "invalid_request_error"),
            AppError::Authentication(_) => (StatusCode::UNAUTHORIZED, "authentication_error"),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found_error"),
            AppError::Upstream(_) => (StatusCode::BAD_GATEWAY, "upstream_error"),
            AppError::EmptyResponse => (StatusCode::INTERNAL_SERVER_ERROR, "empty_response"),
            AppError::Timeout(_) => (StatusCode::GATEWAY_TIMEOUT, "timeout_error"),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "api_error"),
        }
    }
}

/// Axum response implementation for AppError
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type) = self.status_and_type();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = Json(ErrorResponse::new(
            &self.to_string(),
            error_type,
            status.as_str(),
        ));
        (status, body).into_response()
    }
}

/// 错误响应（OpenAI 错误信封）
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

/// 错误详情
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// 错误消息
    pub message: String,
    /// 错误类型
    #[serde(rename = "type")]
    pub error_type: String,
    /// 错误代码
    pub code: String,
}

impl ErrorResponse {
    /// 创建新错误响应
    pub fn new(message: &str, error_type: &str, code: &str) -> Self {
        Self {
            error: ErrorDetail {
                message: message.to_string(),
                error_type: error_type.to_string(),
                code: code.to_string(),
            },
        }
    }
}

/// 结果类型别名
pub type Result<T> = std::result::Result<T, AppError>;
