//! 用户画像持久化
//!
//! 画像以 `users.json`（ID -> 画像）的形式保存在配置的目录中。

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{debug, info};

use crate::error::{AppError, Result};
use crate::models::profile::UserProfile;

/// 画像文件名
pub const PROFILES_FILE: &str = "users.json";

/// 画像持久化 trait
#[async_trait]
pub trait ProfileStorage: Send + Sync {
    /// 启动时读取全部画像
    async fn load_all(&self) -> Result<Vec<UserProfile>>;

    /// 覆盖写入全部画像
    async fn save_all(&self, profiles: &[UserProfile]) -> Result<()>;
}

/// JSON 文件画像存储
pub struct JsonFileProfileStorage {
    dir: PathBuf,
}

impl JsonFileProfileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(PROFILES_FILE)
    }
}

#[async_trait]
impl ProfileStorage for JsonFileProfileStorage {
    async fn load_all(&self) -> Result<Vec<UserProfile>> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let path = self.path();
        let raw = match tokio::fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no profile file yet");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        let map: BTreeMap<String, UserProfile> = serde_json::from_slice(&raw)
            .map_err(|e| AppError::Storage(format!("{}: {}", path.display(), e)))?;
        info!(count = map.len(), path = %path.display(), "loaded user profiles");
        Ok(map.into_values().collect())
    }

    async fn save_all(&self, profiles: &[UserProfile]) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let map: BTreeMap<&str, &UserProfile> =
            profiles.iter().map(|p| (p.id.as_str(), p)).collect();
        let body = serde_json::to_vec_pretty(&map)?;

        let path = self.path();
        let tmp = self.dir.join(format!("{}.tmp", PROFILES_FILE));
        tokio::fs::write(&tmp, body).await?;
        tokio::fs::rename(&tmp, &path).await?;
        debug!(count = profiles.len(), path = %path.display(), "saved user profiles");
        Ok(())
    }
}

/// 内存画像存储，用于测试和无持久化部署
#[derive(Default)]
pub struct MemoryProfileStorage {
    profiles: Mutex<Vec<UserProfile>>,
}

impl MemoryProfileStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_profiles(profiles: Vec<UserProfile>) -> Self {
        Self {
            profiles: Mutex::new(profiles),
        }
    }

    /// 当前保存的画像
    pub fn saved(&self) -> Vec<UserProfile> {
        self.profiles.lock().clone()
    }
}

#[async_trait]
impl ProfileStorage for MemoryProfileStorage {
    async fn load_all(&self) -> Result<Vec<UserProfile>> {
        Ok(self.profiles.lock().clone())
    }

    async fn save_all(&self, profiles: &[UserProfile]) -> Result<()> {
        *self.profiles.lock() = profiles.to_vec();
        Ok(())
    }
}
