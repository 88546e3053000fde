use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::message::Message;
use crate::models::session::{Session, SessionStats, SessionSummary};

#[derive(Debug, Serialize)]
pub struct SessionListResponse {
    pub sessions: Vec<SessionSummary>,
    pub total: usize,
}

/// 会话详情（含完整历史）
#[derive(Debug, Serialize)]
pub struct SessionDetailResponse {
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
    pub message_count: usize,
    pub expires_at: DateTime<Utc>,
    pub messages: Vec<Message>,
}

impl From<Session> for SessionDetailResponse {
    fn from(session: Session) -> Self {
        let summary = session.summary();
        Self {
            session_id: summary.session_id,
            created_at: summary.created_at,
            last_accessed: summary.last_accessed,
            message_count: summary.message_count,
            expires_at: summary.expires_at,
            messages: session.messages,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SessionStatsResponse {
    pub session_stats: SessionStats,
}

#[derive(Debug, Serialize)]
pub struct DeleteSessionResponse {
    pub message: String,
}
