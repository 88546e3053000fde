//! 情绪分类
//!
//! 基于加权模式表对文本打分：每个情绪类别的所有模式（大小写不敏感）匹配次数乘以权重求和，
//! 唯一最高分的类别胜出；并列或全部为零时为 `neutral`。

use figment::{
    Figment,
    providers::{Format, Serialized, Toml},
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

use crate::error::{AppError, Result};

/// 中性情绪标签
pub const NEUTRAL: &str = "neutral";

/// 单条模式
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PatternSpec {
    /// 正则表达式
    pub pattern: String,
    /// 权重
    #[serde(default = "default_weight")]
    pub weight: u32,
}

fn default_weight() -> u32 {
    1
}

/// 情绪类别规则
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmotionRule {
    /// 情绪标签
    pub emotion: String,
    /// 有序模式列表
    pub patterns: Vec<PatternSpec>,
    /// 设备动画指令
    pub animation: String,
    /// 语音合成指导
    pub speech_instruction: String,
}

/// 情绪规则表
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmotionTable {
    /// 情绪类别（有序）
    pub emotions: Vec<EmotionRule>,
    /// 中性动画指令
    pub neutral_animation: String,
    /// 中性语音指导
    pub neutral_instruction: String,
}

impl Default for EmotionTable {
    fn default() -> Self {
        fn rule(emotion: &str, patterns: &[&str], animation: &str, instruction: &str) -> EmotionRule {
            EmotionRule {
                emotion: emotion.to_string(),
                patterns: patterns
                    .iter()
                    .map(|p| PatternSpec {
                        pattern: p.to_string(),
                        weight: 1,
                    })
                    .collect(),
                animation: animation.to_string(),
                speech_instruction: instruction.to_string(),
            }
        }

        Self {
            emotions: vec![
                rule(
                    "happy",
                    &[
                        r"\b(happy|joy|excited|wonderful|great|amazing|fantastic|love|fun)\b",
                        r"!{2,}",
                        "😊|😄|😃|🎉|❤️|💖",
                    ],
                    "cmd:animate:joy",
                    "Speak with joy and enthusiasm, upbeat and cheerful",
                ),
                rule(
                    "sad",
                    &[r"\b(sad|sorry|miss|lonely|hurt|cry|tears)\b", "😢|😭|💔"],
                    "cmd:animate:sympathetic",
                    "Speak with a gentle, sympathetic tone, slightly slower",
                ),
                rule(
                    "curious",
                    &[
                        r"\b(wonder|think|maybe|perhaps|interesting|hmm|curious)\b",
                        r"\?{2,}",
                        "🤔|🧐",
                    ],
                    "cmd:animate:thinking",
                    "Speak with wonder and interest, rising intonation on questions",
                ),
                rule(
                    "excited",
                    &[
                        r"\b(wow|awesome|incredible|can't wait|exciting)\b",
                        r"!{3,}",
                        "🤩|🎊|✨",
                    ],
                    "cmd:animate:celebrate",
                    "Speak with high energy and excitement, faster pace",
                ),
                rule(
                    "caring",
                    &[
                        r"\b(care|help|support|understand|here for you|hug)\b",
                        "🤗|💕|🫂",
                    ],
                    "cmd:animate:hug",
                    "Speak with warmth and compassion, gentle and reassuring",
                ),
            ],
            neutral_animation: "cmd:animate:friendly".to_string(),
            neutral_instruction: "Speak in a friendly, conversational tone".to_string(),
        }
    }
}

/// 情绪对应的动画与语音指导
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EmotionInfo {
    pub animation: String,
    pub speech_instruction: String,
}

struct CompiledCategory {
    emotion: String,
    patterns: Vec<(Regex, u32)>,
}

/// 情绪分类器（无状态，启动时加载一次）
pub struct EmotionClassifier {
    table: EmotionTable,
    categories: Vec<CompiledCategory>,
}

impl EmotionClassifier {
    /// 编译规则表
    pub fn new(table: EmotionTable) -> Result<Self> {
        let categories = table
            .emotions
            .iter()
            .map(|rule| {
                let patterns = rule
                    .patterns
                    .iter()
                    .map(|spec| {
                        Regex::new(&format!("(?i){}", spec.pattern))
                            .map(|re| (re, spec.weight))
                            .map_err(|e| {
                                AppError::Config(format!(
                                    "invalid pattern for emotion '{}': {}",
                                    rule.emotion, e
                                ))
                            })
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(CompiledCategory {
                    emotion: rule.emotion.clone(),
                    patterns,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { table, categories })
    }

    /// 从 TOML 文件加载规则表，缺省时使用内置表
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let table = match path {
            Some(path) => {
                let table: EmotionTable = Figment::from(Serialized::defaults(EmotionTable::default()))
                    .merge(Toml::file(path))
                    .extract()?;
                info!(
                    path = %path.display(),
                    categories = table.emotions.len(),
                    "loaded emotion table"
                );
                table
            }
            None => EmotionTable::default(),
        };
        Self::new(table)
    }

    /// 各类别得分（按规则表顺序）
    pub fn scores(&self, text: &str) -> Vec<(&str, u32)> {
        self.categories
            .iter()
            .map(|category| {
                let score = category
                    .patterns
                    .iter()
                    .map(|(re, weight)| re.find_iter(text).count() as u32 * weight)
                    .sum();
                (category.emotion.as_str(), score)
            })
            .collect()
    }

    /// 分类：唯一最高分胜出，否则为 neutral
    pub fn classify(&self, text: &str) -> String {
        let scores = self.scores(text);
        let best = scores.iter().map(|(_, score)| *score).max().unwrap_or(0);
        if best == 0 {
            return NEUTRAL.to_string();
        }

        let mut leaders = scores.iter().filter(|(_, score)| *score == best);
        let emotion = match (leaders.next(), leaders.next()) {
            (Some((emotion, _)), None) => emotion.to_string(),
            _ => NEUTRAL.to_string(),
        };
        debug!(emotion = %emotion, score = best, "classified emotion");
        emotion
    }

    /// 情绪对应的动画指令
    pub fn animation(&self, emotion: &str) -> &str {
        self.rule(emotion)
            .map(|rule| rule.animation.as_str())
            .unwrap_or(&self.table.neutral_animation)
    }

    /// 情绪对应的语音指导，未知情绪回退到 neutral
    pub fn speech_instruction(&self, emotion: &str) -> &str {
        self.rule(emotion)
            .map(|rule| rule.speech_instruction.as_str())
            .unwrap_or(&self.table.neutral_instruction)
    }

    /// 全部情绪（含 neutral）及其映射
    pub fn describe(&self) -> BTreeMap<String, EmotionInfo> {
        let mut out: BTreeMap<String, EmotionInfo> = self
            .table
            .emotions
            .iter()
            .map(|rule| {
                (
                    rule.emotion.clone(),
                    EmotionInfo {
                        animation: rule.animation.clone(),
                        speech_instruction: rule.speech_instruction.clone(),
                    },
                )
            })
            .collect();
        out.insert(
            NEUTRAL.to_string(),
            EmotionInfo {
                animation: self.table.neutral_animation.clone(),
                speech_instruction: self.table.neutral_instruction.clone(),
            },
        );
        out
    }

    fn rule(&self, emotion: &str) -> Option<&EmotionRule> {
        self.table.emotions.iter().find(|rule| rule.emotion == emotion)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn classifier() -> EmotionClassifier {
        EmotionClassifier::new(EmotionTable::default()).unwrap()
    }

    #[rstest]
    #[case("I'm so happy!! This is wonderful and amazing!!", "happy")]
    #[case("The meeting is at 3pm.", "neutral")]
    #[case("I'm sorry you feel lonely 😢", "sad")]
    #[case("Hmm, I wonder... maybe?? 🤔", "curious")]
    #[case("WOW that is AWESOME", "excited")]
    #[case("I'm here for you, I understand", "caring")]
    fn test_classify(#[case] text: &str, #[case] expected: &str) {
        assert_eq!(classifier().classify(text), expected);
    }

    #[test]
    fn test_tie_is_neutral() {
        // one happy word, one sad word
        assert_eq!(classifier().classify("fun but sad"), NEUTRAL);
    }

    #[test]
    fn test_weights_break_ties() {
        let mut table = EmotionTable::default();
        table.emotions[1].patterns[0].weight = 2;
        let classifier = EmotionClassifier::new(table).unwrap();
        assert_eq!(classifier.classify("fun but sad"), "sad");
    }

    #[test]
    fn test_lookup_fallbacks() {
        let classifier = classifier();
        assert_eq!(classifier.animation("happy"), "cmd:animate:joy");
        assert_eq!(classifier.animation("bored"), "cmd:animate:friendly");
        assert_eq!(
            classifier.speech_instruction("bored"),
            "Speak in a friendly, conversational tone"
        );
        assert_eq!(classifier.describe().len(), 6);
    }

    #[test]
    fn test_invalid_pattern_is_config_error() {
        let mut table = EmotionTable::default();
        table.emotions[0].patterns.push(PatternSpec {
            pattern: "(unclosed".into(),
            weight: 1,
        });
        assert!(matches!(
            EmotionClassifier::new(table),
            Err(AppError::Config(_))
        ));
    }

    #[test]
    fn test_load_table_from_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("emotions.toml");
        std::fs::write(
            &path,
            r#"
neutral_animation = "cmd:animate:idle"
neutral_instruction = "Speak plainly"

[[emotions]]
emotion = "sleepy"
animation = "cmd:animate:yawn"
speech_instruction = "Speak slowly"
patterns = [{ pattern = "\\b(tired|sleepy|yawn)\\b", weight = 1 }]
"#,
        )
        .unwrap();

        let classifier = EmotionClassifier::load(Some(&path)).unwrap();
        assert_eq!(classifier.classify("so tired and sleepy"), "sleepy");
        assert_eq!(classifier.classify("great!!"), NEUTRAL);
        assert_eq!(classifier.animation(NEUTRAL), "cmd:animate:idle");
    }
}
