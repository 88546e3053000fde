//! 可观测性模块
//!
//! 提供 Prometheus 指标、结构化日志和健康检查。

use axum::{
    Json, Router,
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    routing::get,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use tokio::sync::Mutex;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::config::config::LoggingConfig;
use crate::error::{AppError, Result};

// ===== Metrics =====

/// 应用指标
#[derive(Default)]
pub struct AppMetrics {
    pub http_requests_total: AtomicU64,
    pub http_request_duration_sum: AtomicU64,
    pub active_connections: AtomicI64,
    pub chat_requests_total: AtomicU64,
    pub chat_stream_requests_total: AtomicU64,
    pub chat_failures_total: AtomicU64,
    pub identifications_total: AtomicU64,
    pub identification_misses_total: AtomicU64,
    pub profiles_created_total: AtomicU64,
    pub errors_total: AtomicU64,
}

impl AppMetrics {
    /// 记录 HTTP 请求
    pub fn record_http_request(&self, duration_ms: u64) {
        self.http_requests_total.fetch_add(1, Ordering::Relaxed);
        self.http_request_duration_sum
            .fetch_add(duration_ms, Ordering::Relaxed);
    }

    /// 记录活跃连接
    pub fn record_connection(&self, delta: i64) {
        self.active_connections.fetch_add(delta, Ordering::Relaxed);
    }

    /// 记录聊天补全请求
    pub fn record_chat(&self, stream: bool) {
        self.chat_requests_total.fetch_add(1, Ordering::Relaxed);
        if stream {
            self.chat_stream_requests_total
                .fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_chat_failure(&self) {
        self.chat_failures_total.fetch_add(1, Ordering::Relaxed);
    }

    /// 记录用户识别
    pub fn record_identification(&self, hit: bool) {
        self.identifications_total.fetch_add(1, Ordering::Relaxed);
        if !hit {
            self.identification_misses_total
                .fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_profile_created(&self) {
        self.profiles_created_total.fetch_add(1, Ordering::Relaxed);
    }

    /// 记录错误
    pub fn record_error(&self) {
        self.errors_total.fetch_add(1, Ordering::Relaxed);
    }

    /// 生成 Prometheus 格式指标
    pub fn gather(&self) -> String {
        let requests = self.http_requests_total.load(Ordering::Relaxed);
        format!(
            r#"# HELP http_requests_total Total HTTP requests
# TYPE http_requests_total counter
http_requests_total {}
# HELP http_request_duration_seconds HTTP request duration in seconds
# TYPE http_request_duration_seconds summary
http_request_duration_seconds_sum {}
http_request_duration_seconds_count {}
# HELP active_connections Active HTTP connections
# TYPE active_connections gauge
active_connections {}
# HELP chat_requests_total Chat completion requests
# TYPE chat_requests_total counter
chat_requests_total {}
# HELP chat_stream_requests_total Streaming chat completion requests
# TYPE chat_stream_requests_total counter
chat_stream_requests_total {}
# HELP chat_failures_total Chat completions that ended in an error
# TYPE chat_failures_total counter
chat_failures_total {}
# HELP identifications_total User identification attempts
# TYPE identifications_total counter
identifications_total {}
# HELP identification_misses_total Identification attempts with no match
# TYPE identification_misses_total counter
identification_misses_total {}
# HELP profiles_created_total User profiles created
# TYPE profiles_created_total counter
profiles_created_total {}
# HELP errors_total Total server errors
# TYPE errors_total counter
errors_total {}
"#,
            requests,
            self.http_request_duration_sum.load(Ordering::Relaxed) as f64 / 1000.0,
            requests,
            self.active_connections.load(Ordering::Relaxed),
            self.chat_requests_total.load(Ordering::Relaxed),
            self.chat_stream_requests_total.load(Ordering::Relaxed),
            self.chat_failures_total.load(Ordering::Relaxed),
            self.identifications_total.load(Ordering::Relaxed),
            self.identification_misses_total.load(Ordering::Relaxed),
            self.profiles_created_total.load(Ordering::Relaxed),
            self.errors_total.load(Ordering::Relaxed),
        )
    }
}

// ===== Health Check =====

/// 健康检查状态
#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: String,
    pub timestamp: String,
    pub version: String,
    pub uptime_seconds: f64,
    pub checks: Vec<HealthCheck>,
}

/// 单个健康检查项
#[derive(Debug, Serialize)]
pub struct HealthCheck {
    pub name: String,
    pub status: String,
    pub message: Option<String>,
    pub latency_ms: Option<u64>,
}

/// 健康检查结果
#[derive(Debug, Clone)]
pub struct HealthCheckResult {
    pub name: String,
    pub healthy: bool,
    pub message: String,
    pub latency_ms: u64,
}

/// 可观测性状态
pub struct ObservabilityState {
    pub metrics: AppMetrics,
    pub health_checks: Mutex<Vec<HealthCheckResult>>,
    pub start_time: DateTime<Utc>,
    pub version: String,
}

impl ObservabilityState {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            metrics: AppMetrics::default(),
            health_checks: Mutex::new(Vec::new()),
            start_time: Utc::now(),
            version: version.into(),
        }
    }

    /// 添加健康检查结果，同名检查项会被替换
    pub async fn add_health_check(&self, result: HealthCheckResult) {
        let mut checks = self.health_checks.lock().await;
        checks.retain(|c| c.name != result.name);
        checks.push(result);
        if checks.len() > 10 {
            checks.remove(0);
        }
    }

    /// 获取应用正常运行时间
    pub fn uptime_seconds(&self) -> f64 {
        (Utc::now() - self.start_time).num_milliseconds() as f64 / 1000.0
    }
}

fn status_label(healthy: bool) -> String {
    if healthy { "healthy" } else { "unhealthy" }.to_string()
}

// ===== Health Check Handlers =====

/// 获取完整健康状态
pub async fn health_check(State(state): State<Arc<ObservabilityState>>) -> impl IntoResponse {
    let checks = state.health_checks.lock().await;
    let all_healthy = checks.iter().all(|c| c.healthy);

    let health_status = HealthStatus {
        status: status_label(all_healthy),
        timestamp: Utc::now().to_rfc3339(),
        version: state.version.clone(),
        uptime_seconds: state.uptime_seconds(),
        checks: checks
            .iter()
            .map(|c| HealthCheck {
                name: c.name.clone(),
                status: status_label(c.healthy),
                message: Some(c.message.clone()),
                latency_ms: Some(c.latency_ms),
            })
            .collect(),
    };

    let status_code = if all_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(health_status))
}

/// 简单存活检查
pub async fn liveness() -> impl IntoResponse {
    "OK"
}

/// 就绪检查
pub async fn readiness(State(state): State<Arc<ObservabilityState>>) -> impl IntoResponse {
    let checks = state.health_checks.lock().await;
    if checks.iter().all(|c| c.healthy) {
        (StatusCode::OK, "Ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "Not Ready")
    }
}

/// Prometheus 指标端点
pub async fn metrics(State(state): State<Arc<ObservabilityState>>) -> impl IntoResponse {
    (StatusCode::OK, state.metrics.gather())
}

/// 版本信息端点
pub async fn version(State(state): State<Arc<ObservabilityState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "version": state.version,
        "uptime_seconds": state.uptime_seconds(),
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

/// 创建可观测性路由
pub fn create_observability_router(state: Arc<ObservabilityState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/health/live", get(liveness))
        .route("/health/ready", get(readiness))
        .route("/metrics", get(metrics))
        .route("/version", get(version))
        .with_state(state)
}

// ===== Structured Logging =====

/// 初始化日志
///
/// `RUST_LOG` 优先于配置的日志级别。配置了日志目录时额外按天滚动写入文件，
/// 返回的 guard 需要在进程生命周期内持有。
pub fn init_tracing(service_name: &str, config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| AppError::Config(format!("invalid log level '{}': {}", config.level, e)))?;

    let (file_writer, guard) = match &config.log_dir {
        Some(dir) => {
            let appender =
                tracing_appender::rolling::daily(dir, format!("{}.log", service_name));
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(writer), Some(guard))
        }
        None => (None, None),
    };

    let registry = tracing_subscriber::registry().with(filter);
    let installed = if config.structured {
        registry
            .with(fmt::layer().json().with_target(true))
            .with(file_writer.map(|w| fmt::layer().json().with_ansi(false).with_writer(w)))
            .try_init()
    } else {
        registry
            .with(fmt::layer().with_target(true).with_line_number(true))
            .with(file_writer.map(|w| fmt::layer().with_ansi(false).with_writer(w)))
            .try_init()
    };
    installed.map_err(|e| AppError::Config(format!("failed to install tracing subscriber: {}", e)))?;

    Ok(guard)
}

// ===== Request Metrics Middleware =====

/// 记录请求指标的中间件
pub async fn metrics_middleware(
    State(state): State<Arc<ObservabilityState>>,
    req: Request,
    next: Next,
) -> Response {
    let start = std::time::Instant::now();
    state.metrics.record_connection(1);

    let response = next.run(req).await;

    state
        .metrics
        .record_http_request(start.elapsed().as_millis() as u64);
    state.metrics.record_connection(-1);
    if response.status().is_server_error() {
        state.metrics.record_error();
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request as HttpRequest;
    use tower::ServiceExt;

    fn get(uri: &str) -> HttpRequest<Body> {
        HttpRequest::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    #[test]
    fn test_metrics_gather() {
        let metrics = AppMetrics::default();
        metrics.record_http_request(100);
        metrics.record_connection(1);
        metrics.record_chat(true);
        metrics.record_identification(false);
        metrics.record_error();

        let output = metrics.gather();
        assert!(output.contains("http_requests_total 1"));
        assert!(output.contains("active_connections 1"));
        assert!(output.contains("chat_stream_requests_total 1"));
        assert!(output.contains("identification_misses_total 1"));
        assert!(output.contains("errors_total 1"));
    }

    #[test]
    fn test_connection_gauge_goes_back_to_zero() {
        let metrics = AppMetrics::default();
        metrics.record_connection(1);
        metrics.record_connection(-1);
        assert!(metrics.gather().contains("active_connections 0"));
    }

    #[tokio::test]
    async fn test_unhealthy_check_fails_readiness() {
        let state = Arc::new(ObservabilityState::new("0.1.0"));
        state
            .add_health_check(HealthCheckResult {
                name: "model_cli".into(),
                healthy: false,
                message: "probe failed".into(),
                latency_ms: 12,
            })
            .await;

        let response = create_observability_router(state.clone())
            .oneshot(get("/health/ready"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        state
            .add_health_check(HealthCheckResult {
                name: "model_cli".into(),
                healthy: true,
                message: "ok".into(),
                latency_ms: 10,
            })
            .await;
        assert_eq!(state.health_checks.lock().await.len(), 1);

        let response = create_observability_router(state)
            .oneshot(get("/health"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
