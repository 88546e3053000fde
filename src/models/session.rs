use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::models::message::Message;

/// 会话实体
///
/// 保存一个会话的完整对话历史，轮次严格按追加顺序排列。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// 会话唯一标识
    pub id: String,

    /// 对话历史
    pub messages: Vec<Message>,

    /// 会话创建时间
    pub created_at: DateTime<Utc>,

    /// 最后活跃时间
    pub last_active_at: DateTime<Utc>,

    /// 空闲过期时间
    #[serde(with = "ttl_secs")]
    pub ttl: Duration,
}

impl Session {
    /// 创建新会话
    pub fn new(id: &str, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            id: id.to_string(),
            messages: Vec::new(),
            created_at: now,
            last_active_at: now,
            ttl,
        }
    }

    /// 更新最后活跃时间
    pub fn touch(&mut self) {
        self.last_active_at = Utc::now();
    }

    /// 追加消息并刷新活跃时间
    pub fn add_messages(&mut self, messages: impl IntoIterator<Item = Message>) {
        self.messages.extend(messages);
        self.touch();
    }

    /// 过期时间点；超出可表示范围时视为永不过期
    pub fn expires_at(&self) -> DateTime<Utc> {
        chrono::Duration::from_std(self.ttl)
            .ok()
            .and_then(|ttl| self.last_active_at.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// 检查会话是否已过期（空闲时间超过 TTL）
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at()
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// 转换为会话摘要
    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            session_id: self.id.clone(),
            created_at: self.created_at,
            last_accessed: self.last_active_at,
            message_count: self.messages.len(),
            expires_at: self.expires_at(),
        }
    }
}

/// 会话摘要
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionSummary {
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
    pub message_count: usize,
    pub expires_at: DateTime<Utc>,
}

/// 会话存储统计信息
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SessionStats {
    /// 活跃会话数
    pub active_sessions: usize,
    /// 已过期但尚未清理的会话数
    pub expired_sessions: usize,
    /// 所有会话的消息总数
    pub total_messages: usize,
    /// 最早会话的存活时长（秒）
    pub oldest_session_age_secs: Option<i64>,
    /// 会话 TTL（秒）
    pub ttl_secs: u64,
    /// 清理间隔（秒）
    pub cleanup_interval_secs: u64,
}

mod ttl_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(ttl: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(ttl.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}
