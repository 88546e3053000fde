//! 存储层模块
//!
//! 提供会话后端（内存）与用户画像持久化（JSON 文件）。

pub mod profile_storage;
pub mod repository;

pub use profile_storage::{JsonFileProfileStorage, MemoryProfileStorage, ProfileStorage};
pub use repository::{MemorySessionBackend, SessionBackend};
