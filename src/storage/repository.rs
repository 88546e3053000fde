//! 会话存储后端
//!
//! 会话映射的可插拔后端；默认实现为内存 DashMap。

use dashmap::DashMap;

use crate::error::Result;
use crate::models::session::Session;

/// 会话后端 trait
///
/// 所有方法都是同步的：会话表的读写在协作式运行时中不应挂起。
pub trait SessionBackend: Send + Sync {
    /// 按 ID 读取会话
    fn load(&self, id: &str) -> Result<Option<Session>>;

    /// 写入（新增或覆盖）会话
    fn save(&self, session: Session) -> Result<()>;

    /// 删除会话，返回是否存在
    fn remove(&self, id: &str) -> Result<bool>;

    /// 全部会话快照
    fn snapshot(&self) -> Result<Vec<Session>>;

    /// 保留满足条件的会话，返回被删除的数量
    fn retain(&self, keep: &dyn Fn(&Session) -> bool) -> Result<usize>;
}

/// 内存会话后端
#[derive(Default)]
pub struct MemorySessionBackend {
    sessions: DashMap<String, Session>,
}

impl MemorySessionBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionBackend for MemorySessionBackend {
    fn load(&self, id: &str) -> Result<Option<Session>> {
        Ok(self.sessions.get(id).map(|entry| entry.value().clone()))
    }

    fn save(&self, session: Session) -> Result<()> {
        self.sessions.insert(session.id.clone(), session);
        Ok(())
    }

    fn remove(&self, id: &str) -> Result<bool> {
        Ok(self.sessions.remove(id).is_some())
    }

    fn snapshot(&self) -> Result<Vec<Session>> {
        Ok(self
            .sessions
            .iter()
            .map(|entry| entry.value().clone())
            .collect())
    }

    fn retain(&self, keep: &dyn Fn(&Session) -> bool) -> Result<usize> {
        let before = self.sessions.len();
        self.sessions.retain(|_, session| keep(session));
        Ok(before.saturating_sub(self.sessions.len()))
    }
}
