//! Moxie DTOs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::models::profile::{
    IdentificationMethod, IdentificationResult, InteractionSettings, UserProfile,
};
use crate::services::moxie::{EmotionInfo, EnhancedResponse, SpeechDirection};

/// 未识别用户的显示名称
pub const UNKNOWN_USER_NAME: &str = "Friend";

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    #[serde(default)]
    pub text: String,
    /// 覆盖全局的语音合成指导开关
    #[serde(default)]
    pub include_speech: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    pub original_text: String,
    pub filtered_text: String,
    pub emotion: String,
    pub moxie_commands: Vec<String>,
    pub moxie_markup: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speech: Option<SpeechDirection>,
}

impl AnalyzeResponse {
    pub fn new(original_text: String, enhanced: EnhancedResponse) -> Self {
        Self {
            original_text,
            filtered_text: enhanced.text,
            emotion: enhanced.emotion,
            moxie_commands: enhanced.commands,
            moxie_markup: enhanced.markup,
            speech: enhanced.speech,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct EmotionListResponse {
    pub emotions: BTreeMap<String, EmotionInfo>,
}

/// 识别响应中的画像摘要
#[derive(Debug, Serialize)]
pub struct ProfileSummary {
    pub user_id: Option<String>,
    pub name: String,
    #[serde(rename = "type")]
    pub user_type: String,
}

#[derive(Debug, Serialize)]
pub struct IdentifyResponse {
    pub session_id: String,
    pub user_profile: ProfileSummary,
    pub confidence: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<IdentificationMethod>,
    pub settings: InteractionSettings,
}

impl IdentifyResponse {
    pub fn new(session_id: String, result: IdentificationResult) -> Self {
        let user_profile = match result.profile {
            Some(profile) => ProfileSummary {
                user_id: Some(profile.id),
                name: profile.name,
                user_type: profile.user_type.to_string(),
            },
            None => ProfileSummary {
                user_id: None,
                name: UNKNOWN_USER_NAME.to_string(),
                user_type: "unknown".to_string(),
            },
        };

        Self {
            session_id,
            user_profile,
            confidence: result.confidence,
            method: result.method,
            settings: result.settings,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "type", default)]
    pub user_type: Option<String>,
    #[serde(default)]
    pub voice_profile: Option<HashMap<String, f64>>,
    #[serde(default)]
    pub face_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateUserResponse {
    pub user_id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub user_type: String,
    pub message: String,
}

impl From<UserProfile> for CreateUserResponse {
    fn from(profile: UserProfile) -> Self {
        Self {
            message: format!("User profile created for {}", profile.name),
            user_id: profile.id,
            name: profile.name,
            user_type: profile.user_type.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UserSummary {
    pub user_id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub user_type: String,
    pub last_seen: DateTime<Utc>,
}

impl From<UserProfile> for UserSummary {
    fn from(profile: UserProfile) -> Self {
        Self {
            user_id: profile.id,
            name: profile.name,
            user_type: profile.user_type.to_string(),
            last_seen: profile.last_seen,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UserListResponse {
    pub users: Vec<UserSummary>,
    /// 最近一次识别命中的用户
    pub current_user: Option<String>,
}
