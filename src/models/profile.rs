//! 用户画像数据模型
//!
//! 存储陪伴设备用户的身份、类型、识别特征与偏好设置

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// 用户类型
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserType {
    /// 儿童
    Child,
    /// 成人
    #[default]
    Adult,
    /// 未知
    Unknown,
}

impl UserType {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserType::Child => "child",
            UserType::Adult => "adult",
            UserType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for UserType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for UserType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "child" => Ok(UserType::Child),
            "adult" => Ok(UserType::Adult),
            "unknown" => Ok(UserType::Unknown),
            other => Err(format!("unknown user type: {}", other)),
        }
    }
}

/// 用户画像
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserProfile {
    /// 画像唯一标识，格式为 `{type}_{n}`，创建后不可变
    pub id: String,

    /// 显示名称
    pub name: String,

    /// 用户类型
    pub user_type: UserType,

    /// 声纹特征（数值特征）
    #[serde(default)]
    pub voice_profile: Option<HashMap<String, f64>>,

    /// 人脸识别标识
    #[serde(default)]
    pub face_id: Option<String>,

    /// 最后一次被识别的时间
    pub last_seen: DateTime<Utc>,

    /// 可变偏好设置
    #[serde(default)]
    pub preferences: HashMap<String, serde_json::Value>,
}

impl UserProfile {
    /// 创建新画像
    pub fn new(
        id: String,
        name: &str,
        user_type: UserType,
        voice_profile: Option<HashMap<String, f64>>,
        face_id: Option<String>,
    ) -> Self {
        Self {
            id,
            name: name.to_string(),
            user_type,
            voice_profile,
            face_id,
            last_seen: Utc::now(),
            preferences: HashMap::new(),
        }
    }

    /// 刷新最后识别时间
    pub fn mark_seen(&mut self) {
        self.last_seen = Utc::now();
    }
}

/// 声音特征
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct VoiceFeatures {
    /// 基频（Hz）
    #[serde(default)]
    pub pitch: f64,

    /// 其他特征
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// 识别信号集合
///
/// 任意字段都可以缺省；识别按 voice → face → spoken-code → direct-id 依次尝试。
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SignalBundle {
    #[serde(default)]
    pub voice_features: Option<VoiceFeatures>,
    #[serde(default)]
    pub face_id: Option<String>,
    #[serde(default)]
    pub spoken_code: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
}

/// 识别方式
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IdentificationMethod {
    Voice,
    Face,
    SpokenCode,
    DirectId,
}

impl IdentificationMethod {
    /// 该识别方式命中时的置信度
    pub fn confidence(&self) -> f32 {
        match self {
            IdentificationMethod::Voice => 0.8,
            IdentificationMethod::Face => 0.9,
            IdentificationMethod::SpokenCode | IdentificationMethod::DirectId => 1.0,
        }
    }
}

/// 交互设置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InteractionSettings {
    /// 儿童模式
    pub child_mode: bool,
    /// 内容过滤级别：`strict` / `none`
    pub content_filter: String,
    /// 语速：`normal` / `slightly_slow`
    pub voice_speed: String,
    /// 表达复杂度：`simple` / `full`
    pub complexity: String,
    /// 是否鼓励学习
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encourage_learning: Option<bool>,
    /// 用户称呼
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
}

/// 识别结果（不持久化）
#[derive(Debug, Clone, Serialize)]
pub struct IdentificationResult {
    /// 命中的画像
    pub profile: Option<UserProfile>,
    /// 置信度 [0, 1]
    pub confidence: f32,
    /// 命中的识别方式
    pub method: Option<IdentificationMethod>,
    /// 派生的交互设置
    pub settings: InteractionSettings,
}
