//! 响应增强
//!
//! 内容过滤 → 情绪分类 → 设备指令标记 → （可选）语音合成指导。

use serde::Serialize;
use std::sync::Arc;

use crate::services::moxie::emotion::{EmotionClassifier, NEUTRAL};

/// 语音合成固定音色
pub const SPEECH_VOICE: &str = "sage";

/// 长文本暂停指令
pub const PAUSE_COMMAND: &str = "cmd:pause:2";

/// 超过该字符数时追加暂停指令
pub const PAUSE_THRESHOLD_CHARS: usize = 200;

/// 语音合成指导参数
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SpeechDirection {
    pub voice: String,
    pub emotion: String,
    pub emotion_instruction: String,
}

/// 增强结果
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EnhancedResponse {
    /// 过滤后的文本
    pub text: String,
    /// 情绪标签
    pub emotion: String,
    /// 有序设备指令
    pub commands: Vec<String>,
    /// 设备标记文本
    pub markup: String,
    /// 语音合成指导
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speech: Option<SpeechDirection>,
}

/// 儿童友好内容过滤：按顺序做字面前缀替换，每个前缀最多替换一次
#[derive(Debug, Clone)]
pub struct ContentFilter {
    replacements: Vec<(String, String)>,
}

impl Default for ContentFilter {
    fn default() -> Self {
        Self::new(vec![
            (
                "I don't know".to_string(),
                "That's a great question! Let me think about that".to_string(),
            ),
            (
                "I can't".to_string(),
                "Let's see what we can do instead".to_string(),
            ),
            (
                "No".to_string(),
                "Hmm, how about we try something else".to_string(),
            ),
        ])
    }
}

impl ContentFilter {
    pub fn new(replacements: Vec<(String, String)>) -> Self {
        Self { replacements }
    }

    pub fn apply(&self, text: &str) -> String {
        let mut out = text.to_string();
        for (prefix, replacement) in &self.replacements {
            if let Some(rest) = out.strip_prefix(prefix.as_str()) {
                out = format!("{}{}", replacement, rest);
            }
        }
        out
    }
}

/// 响应增强器
pub struct ResponseEnhancer {
    classifier: Arc<EmotionClassifier>,
    filter: ContentFilter,
    emotion_detection: bool,
}

impl ResponseEnhancer {
    pub fn new(classifier: Arc<EmotionClassifier>, emotion_detection: bool) -> Self {
        Self {
            classifier,
            filter: ContentFilter::default(),
            emotion_detection,
        }
    }

    pub fn classifier(&self) -> &EmotionClassifier {
        &self.classifier
    }

    /// 增强文本
    pub fn enhance(&self, text: &str, include_speech_direction: bool) -> EnhancedResponse {
        let filtered = self.filter.apply(text);

        let emotion = if self.emotion_detection {
            self.classifier.classify(&filtered)
        } else {
            NEUTRAL.to_string()
        };

        let mut commands = vec![self.classifier.animation(&emotion).to_string()];
        if filtered.chars().count() > PAUSE_THRESHOLD_CHARS {
            commands.push(PAUSE_COMMAND.to_string());
        }

        let markup = render_markup(&commands, &filtered);

        let speech = include_speech_direction.then(|| SpeechDirection {
            voice: SPEECH_VOICE.to_string(),
            emotion: emotion.clone(),
            emotion_instruction: self.classifier.speech_instruction(&emotion).to_string(),
        });

        EnhancedResponse {
            text: filtered,
            emotion,
            commands,
            markup,
            speech,
        }
    }
}

/// 每条指令一行 `<cmd>`，随后是正文；没有指令时为正文本身
pub fn render_markup(commands: &[String], text: &str) -> String {
    if commands.is_empty() {
        return text.to_string();
    }
    let lines: Vec<String> = commands.iter().map(|cmd| format!("<{}>", cmd)).collect();
    format!("{}\n{}", lines.join("\n"), text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::moxie::emotion::EmotionTable;

    fn enhancer() -> ResponseEnhancer {
        ResponseEnhancer::new(
            Arc::new(EmotionClassifier::new(EmotionTable::default()).unwrap()),
            true,
        )
    }

    #[test]
    fn test_content_filter_prefixes() {
        let filter = ContentFilter::default();
        assert_eq!(
            filter.apply("I don't know the answer."),
            "That's a great question! Let me think about that the answer."
        );
        assert_eq!(
            filter.apply("I can't do that."),
            "Let's see what we can do instead do that."
        );
        assert_eq!(filter.apply("No."), "Hmm, how about we try something else.");
        assert_eq!(filter.apply("Sure, I don't know."), "Sure, I don't know.");
    }

    #[test]
    fn test_happy_markup() {
        let enhanced = enhancer().enhance("I'm so happy!! This is wonderful and amazing!!", false);
        assert_eq!(enhanced.emotion, "happy");
        assert_eq!(enhanced.commands, vec!["cmd:animate:joy"]);
        assert_eq!(
            enhanced.markup,
            "<cmd:animate:joy>\nI'm so happy!! This is wonderful and amazing!!"
        );
        assert!(enhanced.speech.is_none());
    }

    #[test]
    fn test_long_text_gets_pause_and_speech() {
        let text = "The meeting is at 3pm. ".repeat(10);
        let enhanced = enhancer().enhance(&text, true);
        assert_eq!(enhanced.emotion, "neutral");
        assert_eq!(enhanced.commands, vec!["cmd:animate:friendly", "cmd:pause:2"]);
        assert!(enhanced.markup.starts_with("<cmd:animate:friendly>\n<cmd:pause:2>\n"));

        let speech = enhanced.speech.unwrap();
        assert_eq!(speech.voice, "sage");
        assert_eq!(speech.emotion, "neutral");
        assert_eq!(speech.emotion_instruction, "Speak in a friendly, conversational tone");
    }

    #[test]
    fn test_exactly_200_chars_has_no_pause() {
        let text = "a".repeat(200);
        assert_eq!(enhancer().enhance(&text, false).commands.len(), 1);
    }

    #[test]
    fn test_detection_disabled_is_neutral() {
        let enhancer = ResponseEnhancer::new(
            Arc::new(EmotionClassifier::new(EmotionTable::default()).unwrap()),
            false,
        );
        assert_eq!(enhancer.enhance("so happy!!", false).emotion, "neutral");
    }

    #[test]
    fn test_markup_without_commands() {
        assert_eq!(render_markup(&[], "plain"), "plain");
    }
}
