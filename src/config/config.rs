use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    /// 服务地址
    pub host: String,
    /// 服务端口
    pub port: u16,
    /// 允许的 CORS 来源，`*` 表示全部
    pub cors_origins: Vec<String>,
}

/// 安全配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SecurityConfig {
    /// API 密钥，未配置时接口不做认证
    pub api_key: Option<String>,
}

/// 会话配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SessionSettings {
    /// 会话空闲过期时间（秒）
    pub ttl_secs: u64,
    /// 后台清理间隔（秒）
    pub cleanup_interval_secs: u64,
}

/// 模型执行进程配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ExecutorConfig {
    /// 模型 CLI 可执行文件路径
    pub cli_path: PathBuf,
    /// 子进程工作目录
    pub cwd: Option<PathBuf>,
    /// 两个事件之间的最大等待时间（毫秒）
    pub timeout_ms: u64,
    /// 默认最大轮次
    pub default_max_turns: u32,
    /// 启动时是否探测 CLI 可用性
    pub verify_on_startup: bool,
}

/// Moxie 个性化配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct MoxieConfig {
    /// 是否对非流式响应做 Moxie 增强
    pub enabled: bool,
    /// 是否启用情绪检测
    pub emotion_detection: bool,
    /// 是否附带语音合成指导参数
    pub speech_direction: bool,
    /// 外部情绪规则表（TOML）
    pub emotion_table: Option<PathBuf>,
}

/// 用户识别配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct IdentityConfig {
    /// 用户画像存储目录
    pub profiles_dir: PathBuf,
    /// 口令 -> 用户 ID
    pub code_phrases: BTreeMap<String, String>,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct LoggingConfig {
    /// 日志级别
    pub level: String,
    /// 结构化日志格式
    pub structured: bool,
    /// 日志文件目录
    pub log_dir: Option<PathBuf>,
}

/// 应用配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// 服务器配置
    pub server: ServerConfig,
    /// 安全配置
    pub security: SecurityConfig,
    /// 会话配置
    pub session: SessionSettings,
    /// 模型执行配置
    pub executor: ExecutorConfig,
    /// Moxie 配置
    pub moxie: MoxieConfig,
    /// 用户识别配置
    pub identity: IdentityConfig,
    /// 日志配置
    pub logging: LoggingConfig,
    /// 应用名称
    pub app_name: String,
    /// 环境
    pub environment: String,
}

impl AppConfig {
    /// 创建开发环境配置
    pub fn development() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".into(),
                port: 8000,
                cors_origins: vec!["*".into()],
            },
            security: SecurityConfig { api_key: None },
            session: SessionSettings {
                ttl_secs: 3600,
                cleanup_interval_secs: 300,
            },
            executor: ExecutorConfig {
                cli_path: PathBuf::from("claude"),
                cwd: None,
                timeout_ms: 600_000,
                default_max_turns: 10,
                verify_on_startup: true,
            },
            moxie: MoxieConfig {
                enabled: true,
                emotion_detection: true,
                speech_direction: false,
                emotion_table: None,
            },
            identity: IdentityConfig {
                profiles_dir: PathBuf::from("./profiles"),
                code_phrases: default_code_phrases(),
            },
            logging: LoggingConfig {
                level: "info".into(),
                structured: false,
                log_dir: None,
            },
            app_name: "moxie-gateway".into(),
            environment: "development".into(),
        }
    }

    /// 创建生产环境配置
    pub fn production() -> Self {
        let mut config = Self::development();
        config.environment = "production".into();
        config.logging.structured = true;
        config
    }
}

/// 默认口令表
fn default_code_phrases() -> BTreeMap<String, String> {
    [
        ("red dragon", "adult_1"),
        ("blue unicorn", "child_1"),
        ("green robot", "adult_2"),
        ("purple star", "child_2"),
    ]
    .into_iter()
    .map(|(phrase, id)| (phrase.to_string(), id.to_string()))
    .collect()
}
