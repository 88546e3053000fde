//! 核心数据模型模块
//!
//! 定义网关的核心数据结构：Message, Session, UserProfile, 以及模型输出的
//! 原始事件与规范化流事件。

pub mod chat;
pub mod message;
pub mod profile;
pub mod session;
pub mod stream;

pub use chat::*;
pub use message::*;
pub use profile::*;
pub use session::*;
pub use stream::*;
