//! Moxie 个性化服务
//!
//! 情绪分类与响应增强。

pub mod emotion;
pub mod enhancer;

pub use emotion::{EmotionClassifier, EmotionInfo, EmotionTable, NEUTRAL};
pub use enhancer::{ContentFilter, EnhancedResponse, ResponseEnhancer, SpeechDirection};
