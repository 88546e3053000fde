//! 会话服务
//!
//! 管理会话生命周期：历史合并、助手轮次追加、TTL 过期与后台清理。
//! 内部簿记错误不会传给调用方，只记录日志并按“会话不存在”处理。

use chrono::Utc;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{Instant, interval_at};
use tracing::{debug, info, warn};

use crate::config::config::SessionSettings;
use crate::models::message::Message;
use crate::models::session::{Session, SessionStats, SessionSummary};
use crate::storage::repository::{MemorySessionBackend, SessionBackend};

/// 会话存储
pub struct SessionStore {
    backend: Arc<dyn SessionBackend>,
    /// 读-改-写互斥
    lock: Mutex<()>,
    ttl: Duration,
    cleanup_interval: Duration,
}

impl SessionStore {
    /// 创建新的会话存储
    pub fn new(backend: Arc<dyn SessionBackend>, ttl: Duration, cleanup_interval: Duration) -> Self {
        Self {
            backend,
            lock: Mutex::new(()),
            ttl,
            cleanup_interval,
        }
    }

    /// 基于内存后端创建
    pub fn in_memory(settings: &SessionSettings) -> Self {
        Self::new(
            Arc::new(MemorySessionBackend::new()),
            Duration::from_secs(settings.ttl_secs),
            Duration::from_secs(settings.cleanup_interval_secs),
        )
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn cleanup_interval(&self) -> Duration {
        self.cleanup_interval
    }

    /// 合并请求消息与会话历史
    ///
    /// - 无会话 ID：原样返回，不产生副作用
    /// - 未知（或已过期）ID：以请求消息创建新会话
    /// - 已知 ID：只追加新的尾部消息，返回完整历史
    ///
    /// 请求消息比已存历史更长时，视为客户端重发了完整历史，按数量只追加多出的尾部；
    /// 否则整体视为新消息。只看位置与数量，不比较内容。
    pub fn resolve_and_extend(
        &self,
        mut incoming: Vec<Message>,
        session_id: Option<&str>,
    ) -> (Vec<Message>, Option<String>) {
        let Some(id) = session_id else {
            return (incoming, None);
        };

        let _guard = self.lock.lock();

        let mut session = match self.load_live(id) {
            Some(session) => session,
            None => {
                info!(session_id = %id, "created new session");
                Session::new(id, self.ttl)
            }
        };

        let stored = session.messages.len();
        let new_messages = if incoming.len() > stored {
            incoming.split_off(stored)
        } else {
            incoming
        };
        let added = new_messages.len();
        session.add_messages(new_messages);

        let history = session.messages.clone();
        if let Err(e) = self.backend.save(session) {
            warn!(session_id = %id, error = %e, "failed to save session");
        }

        info!(
            session_id = %id,
            new_messages = added,
            total_messages = history.len(),
            "session history resolved"
        );
        (history, Some(id.to_string()))
    }

    /// 追加助手轮次；会话不存在时只记录日志
    pub fn append_assistant_turn(&self, session_id: &str, message: Message) {
        let _guard = self.lock.lock();

        let Some(mut session) = self.load_live(session_id) else {
            debug!(session_id = %session_id, "assistant turn for unknown session dropped");
            return;
        };

        session.add_messages(std::iter::once(message));
        match self.backend.save(session) {
            Ok(()) => debug!(session_id = %session_id, "assistant turn appended"),
            Err(e) => warn!(session_id = %session_id, error = %e, "failed to save session"),
        }
    }

    /// 获取会话并刷新活跃时间
    pub fn get(&self, session_id: &str) -> Option<Session> {
        let _guard = self.lock.lock();

        let mut session = self.load_live(session_id)?;
        session.touch();
        if let Err(e) = self.backend.save(session.clone()) {
            warn!(session_id = %session_id, error = %e, "failed to save session");
        }
        Some(session)
    }

    /// 删除会话（幂等），返回会话是否存在
    pub fn delete(&self, session_id: &str) -> bool {
        let _guard = self.lock.lock();

        match self.backend.remove(session_id) {
            Ok(existed) => {
                if existed {
                    info!(session_id = %session_id, "deleted session");
                }
                existed
            }
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "failed to delete session");
                false
            }
        }
    }

    /// 列出所有未过期会话
    pub fn list_all(&self) -> Vec<SessionSummary> {
        let now = Utc::now();
        let mut summaries: Vec<SessionSummary> = self
            .snapshot()
            .iter()
            .filter(|session| !session.is_expired_at(now))
            .map(Session::summary)
            .collect();
        summaries.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        summaries
    }

    /// 统计信息
    pub fn stats(&self) -> SessionStats {
        let now = Utc::now();
        let sessions = self.snapshot();
        let (live, expired): (Vec<&Session>, Vec<&Session>) =
            sessions.iter().partition(|session| !session.is_expired_at(now));

        SessionStats {
            active_sessions: live.len(),
            expired_sessions: expired.len(),
            total_messages: live.iter().map(|session| session.messages.len()).sum(),
            oldest_session_age_secs: live
                .iter()
                .map(|session| (now - session.created_at).num_seconds())
                .max(),
            ttl_secs: self.ttl.as_secs(),
            cleanup_interval_secs: self.cleanup_interval.as_secs(),
        }
    }

    /// 删除所有过期会话，返回删除数量
    pub fn cleanup_expired(&self) -> usize {
        let _guard = self.lock.lock();

        let now = Utc::now();
        match self.backend.retain(&|session| !session.is_expired_at(now)) {
            Ok(removed) => {
                if removed > 0 {
                    info!(removed, "cleaned up expired sessions");
                }
                removed
            }
            Err(e) => {
                warn!(error = %e, "session cleanup failed");
                0
            }
        }
    }

    /// 启动后台清理任务
    pub fn start_cleanup(self: &Arc<Self>) -> CleanupHandle {
        let store = Arc::clone(self);
        let period = self.cleanup_interval;
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        store.cleanup_expired();
                    }
                    _ = &mut shutdown_rx => {
                        debug!("session cleanup task stopping");
                        break;
                    }
                }
            }
        });

        info!(interval_secs = period.as_secs_f64(), "started session cleanup task");
        CleanupHandle {
            shutdown: Some(shutdown_tx),
            task,
        }
    }

    /// 读取未过期会话；过期会话顺带删除
    fn load_live(&self, session_id: &str) -> Option<Session> {
        match self.backend.load(session_id) {
            Ok(Some(session)) if session.is_expired() => {
                info!(session_id = %session_id, "removed expired session");
                if let Err(e) = self.backend.remove(session_id) {
                    warn!(session_id = %session_id, error = %e, "failed to remove expired session");
                }
                None
            }
            Ok(found) => found,
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "failed to load session");
                None
            }
        }
    }

    fn snapshot(&self) -> Vec<Session> {
        self.backend.snapshot().unwrap_or_else(|e| {
            warn!(error = %e, "failed to list sessions");
            Vec::new()
        })
    }
}

/// 后台清理任务句柄
pub struct CleanupHandle {
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl CleanupHandle {
    /// 停止清理任务并等待其退出
    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Err(e) = (&mut self.task).await {
            warn!(error = %e, "session cleanup task ended abnormally");
        }
        info!("session cleanup task stopped");
    }
}

impl Drop for CleanupHandle {
    fn drop(&mut self) {
        if self.shutdown.is_some() {
            self.task.abort();
        }
    }
}
