//! 服务模块

pub mod chat;
pub mod executor;
pub mod identity;
pub mod moxie;
pub mod parameters;
pub mod prompt;
pub mod session;
pub mod translator;

pub use chat::{ChatReply, ChatService, ChatStream};
pub use executor::{CliExecutor, ExecutionRequest, ModelExecutor, PermissionMode, ScriptedExecutor};
pub use identity::UserIdentifier;
pub use moxie::{EmotionClassifier, EnhancedResponse, ResponseEnhancer};
pub use prompt::{Prompt, PromptBuilder};
pub use session::{CleanupHandle, SessionStore};
pub use translator::{StreamTranslator, TranslatorConfig};
