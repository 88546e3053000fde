use crate::config::config::AppConfig;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use std::path::{Path, PathBuf};

/// 会话 TTL 上限（一年）
pub const MAX_SESSION_TTL_SECS: u64 = 365 * 24 * 60 * 60;

/// 配置加载器
pub struct ConfigLoader;

impl ConfigLoader {
    /// 从默认路径加载配置
    ///
    /// 合并顺序：
    /// 1. 内置开发环境默认值
    /// 2. ./moxie.toml
    /// 3. 环境变量（`MOXIE_` 前缀，`__` 分隔嵌套字段）
    pub fn load() -> Result<AppConfig, figment::Error> {
        Self::load_from(default_config_path())
    }

    /// 从指定路径加载配置
    pub fn load_from(path: PathBuf) -> Result<AppConfig, figment::Error> {
        Self::figment(&path).extract()
    }

    fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(AppConfig::development()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("MOXIE_").split("__"))
    }

    /// 验证配置
    pub fn validate(config: &AppConfig) -> Result<(), ConfigValidationError> {
        if config.server.port == 0 {
            return Err(ConfigValidationError::InvalidPort);
        }

        if config.session.ttl_secs == 0 || config.session.ttl_secs > MAX_SESSION_TTL_SECS {
            return Err(ConfigValidationError::InvalidSessionTtl);
        }

        if config.session.cleanup_interval_secs == 0 {
            return Err(ConfigValidationError::InvalidCleanupInterval);
        }

        if config.executor.timeout_ms == 0 {
            return Err(ConfigValidationError::InvalidExecutorTimeout);
        }

        if config.executor.cli_path.as_os_str().is_empty() {
            return Err(ConfigValidationError::MissingExecutorPath);
        }

        Ok(())
    }
}

/// 配置验证错误
#[derive(thiserror::Error, Debug)]
pub enum ConfigValidationError {
    #[error("server port must be greater than 0")]
    InvalidPort,

    #[error("session ttl must be between 1 and {} seconds", MAX_SESSION_TTL_SECS)]
    InvalidSessionTtl,

    #[error("session cleanup interval must be greater than 0")]
    InvalidCleanupInterval,

    #[error("model executor timeout must be greater than 0")]
    InvalidExecutorTimeout,

    #[error("model executor path is not configured")]
    MissingExecutorPath,
}

/// 获取默认配置文件路径
pub fn default_config_path() -> PathBuf {
    PathBuf::from("moxie.toml")
}
