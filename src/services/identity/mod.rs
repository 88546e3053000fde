//! 用户识别服务
//!
//! 按 voice → face → spoken-code → direct-id 的固定顺序尝试识别，第一个命中者胜出。
//! 画像读取走内存缓存，创建时先写缓存再落盘；落盘失败只记录日志。

pub mod strategies;

use chrono::Utc;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::error::{AppError, Result};
use crate::models::profile::{
    IdentificationResult, InteractionSettings, SignalBundle, UserProfile, UserType,
};
use crate::storage::profile_storage::ProfileStorage;

pub use strategies::{
    DirectIdStrategy, FaceStrategy, IdentificationStrategy, SpokenCodeStrategy, VoiceStrategy,
};

/// 用户识别器
pub struct UserIdentifier {
    profiles: RwLock<BTreeMap<String, UserProfile>>,
    storage: Arc<dyn ProfileStorage>,
    /// 串行化“写缓存 + 落盘”
    write_lock: tokio::sync::Mutex<()>,
    strategies: Vec<Box<dyn IdentificationStrategy>>,
    current_user: RwLock<Option<String>>,
}

impl UserIdentifier {
    /// 使用默认识别顺序创建
    pub fn new(
        storage: Arc<dyn ProfileStorage>,
        profiles: Vec<UserProfile>,
        code_phrases: &BTreeMap<String, String>,
    ) -> Self {
        let strategies: Vec<Box<dyn IdentificationStrategy>> = vec![
            Box::new(VoiceStrategy),
            Box::new(FaceStrategy),
            Box::new(SpokenCodeStrategy::new(code_phrases)),
            Box::new(DirectIdStrategy),
        ];

        Self {
            profiles: RwLock::new(profiles.into_iter().map(|p| (p.id.clone(), p)).collect()),
            storage,
            write_lock: tokio::sync::Mutex::new(()),
            strategies,
            current_user: RwLock::new(None),
        }
    }

    /// 启动时从持久化存储加载画像；加载失败时以空缓存启动
    pub async fn load(
        storage: Arc<dyn ProfileStorage>,
        code_phrases: &BTreeMap<String, String>,
    ) -> Self {
        let profiles = match storage.load_all().await {
            Ok(profiles) => profiles,
            Err(e) => {
                error!(error = %e, "failed to load user profiles, starting empty");
                Vec::new()
            }
        };
        Self::new(storage, profiles, code_phrases)
    }

    /// 识别用户
    pub fn identify(&self, signals: &SignalBundle) -> IdentificationResult {
        let hit = {
            let mut profiles = self.profiles.write();
            self.strategies.iter().find_map(|strategy| {
                let id = strategy.identify(signals, &profiles)?;
                let profile = profiles.get_mut(&id)?;
                profile.mark_seen();
                Some((profile.clone(), strategy.method()))
            })
        };

        let result = match hit {
            Some((profile, method)) => {
                info!(
                    user_id = %profile.id,
                    user_type = %profile.user_type,
                    method = ?method,
                    "identified user"
                );
                IdentificationResult {
                    settings: Self::get_interaction_mode(Some(&profile)),
                    confidence: method.confidence(),
                    method: Some(method),
                    profile: Some(profile),
                }
            }
            None => {
                info!("user not identified, using child-safe defaults");
                IdentificationResult {
                    profile: None,
                    confidence: 0.0,
                    method: None,
                    settings: Self::get_interaction_mode(None),
                }
            }
        };

        *self.current_user.write() = result.profile.as_ref().map(|p| p.id.clone());
        result
    }

    /// 创建画像并落盘
    pub async fn create(
        &self,
        name: &str,
        user_type: UserType,
        voice_profile: Option<HashMap<String, f64>>,
        face_id: Option<String>,
    ) -> Result<UserProfile> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::Validation("name is required".into()));
        }

        let _write = self.write_lock.lock().await;

        let (profile, snapshot) = {
            let mut profiles = self.profiles.write();
            let mut n = profiles.len() + 1;
            let mut id = format!("{}_{}", user_type, n);
            while profiles.contains_key(&id) {
                n += 1;
                id = format!("{}_{}", user_type, n);
            }

            let profile = UserProfile::new(id, name, user_type, voice_profile, face_id);
            profiles.insert(profile.id.clone(), profile.clone());
            (profile, profiles.values().cloned().collect::<Vec<_>>())
        };

        if let Err(e) = self.storage.save_all(&snapshot).await {
            warn!(user_id = %profile.id, error = %e, "failed to persist user profiles");
        }

        info!(user_id = %profile.id, user_type = %profile.user_type, "created user profile");
        Ok(profile)
    }

    /// 全部画像（按 ID 排序）
    pub fn list(&self) -> Vec<UserProfile> {
        self.profiles.read().values().cloned().collect()
    }

    pub fn get(&self, id: &str) -> Option<UserProfile> {
        self.profiles.read().get(id).cloned()
    }

    /// 当前活跃用户
    pub fn current_user(&self) -> Option<UserProfile> {
        let current = self.current_user.read().clone()?;
        self.get(&current)
    }

    /// 根据画像派生交互设置；未知用户使用儿童安全默认值
    pub fn get_interaction_mode(profile: Option<&UserProfile>) -> InteractionSettings {
        match profile {
            Some(profile) if profile.user_type == UserType::Child => InteractionSettings {
                child_mode: true,
                content_filter: "strict".into(),
                voice_speed: "slightly_slow".into(),
                complexity: "simple".into(),
                encourage_learning: Some(true),
                user_name: Some(profile.name.clone()),
            },
            Some(profile) if profile.user_type == UserType::Adult => InteractionSettings {
                child_mode: false,
                content_filter: "none".into(),
                voice_speed: "normal".into(),
                complexity: "full".into(),
                encourage_learning: None,
                user_name: Some(profile.name.clone()),
            },
            _ => InteractionSettings {
                child_mode: true,
                content_filter: "strict".into(),
                voice_speed: "normal".into(),
                complexity: "simple".into(),
                encourage_learning: None,
                user_name: None,
            },
        }
    }
}

/// 识别会话 ID
pub fn new_moxie_session_id() -> String {
    format!("moxie_{}", Utc::now().timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::profile::{IdentificationMethod, VoiceFeatures};
    use crate::storage::profile_storage::MemoryProfileStorage;
    use async_trait::async_trait;

    fn phrases() -> BTreeMap<String, String> {
        [("red dragon".to_string(), "adult_1".to_string())]
            .into_iter()
            .collect()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_creates_keep_unique_ids() {
        let storage = Arc::new(MemoryProfileStorage::new());
        let identifier = Arc::new(UserIdentifier::load(storage.clone(), &phrases()).await);

        let tasks: Vec<_> = (0..16)
            .map(|i| {
                let identifier = Arc::clone(&identifier);
                tokio::spawn(async move {
                    let user_type = if i % 2 == 0 { UserType::Child } else { UserType::Adult };
                    identifier
                        .create(&format!("user {}", i), user_type, None, None)
                        .await
                        .unwrap()
                })
            })
            .collect();

        let mut ids = std::collections::HashSet::new();
        for task in tasks {
            assert!(ids.insert(task.await.unwrap().id));
        }

        assert_eq!(ids.len(), 16);
        assert_eq!(identifier.list().len(), 16);
        let saved: std::collections::HashSet<String> =
            storage.saved().into_iter().map(|p| p.id).collect();
        assert_eq!(saved, ids);
    }

    async fn identifier_with_family() -> (UserIdentifier, Arc<MemoryProfileStorage>) {
        let storage = Arc::new(MemoryProfileStorage::new());
        let identifier = UserIdentifier::load(storage.clone(), &phrases()).await;
        identifier
            .create("Alice", UserType::Adult, None, Some("face-alice".into()))
            .await
            .unwrap();
        identifier
            .create("Bo", UserType::Child, None, Some("face-bo".into()))
            .await
            .unwrap();
        (identifier, storage)
    }

    #[tokio::test]
    async fn test_create_assigns_ids_and_persists() {
        let (identifier, storage) = identifier_with_family().await;
        let ids: Vec<String> = identifier.list().into_iter().map(|p| p.id).collect();
        assert_eq!(ids, vec!["adult_1", "child_2"]);
        assert_eq!(storage.saved().len(), 2);
    }

    #[tokio::test]
    async fn test_create_rejects_empty_name() {
        let (identifier, _) = identifier_with_family().await;
        assert!(matches!(
            identifier.create("  ", UserType::Adult, None, None).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_create_skips_taken_ids() {
        let storage = Arc::new(MemoryProfileStorage::with_profiles(vec![UserProfile::new(
            "adult_1".into(),
            "Existing",
            UserType::Adult,
            None,
            None,
        )]));
        let identifier = UserIdentifier::load(storage, &phrases()).await;
        // count + 1 = 2 is free
        let created = identifier.create("New", UserType::Adult, None, None).await.unwrap();
        assert_eq!(created.id, "adult_2");

        let storage = Arc::new(MemoryProfileStorage::with_profiles(vec![UserProfile::new(
            "adult_2".into(),
            "Existing",
            UserType::Adult,
            None,
            None,
        )]));
        let identifier = UserIdentifier::load(storage, &phrases()).await;
        let created = identifier.create("New", UserType::Adult, None, None).await.unwrap();
        assert_eq!(created.id, "adult_3");
    }

    #[tokio::test]
    async fn test_face_beats_spoken_code() {
        let (identifier, _) = identifier_with_family().await;
        let result = identifier.identify(&SignalBundle {
            face_id: Some("face-bo".into()),
            spoken_code: Some("red dragon".into()),
            ..Default::default()
        });
        assert_eq!(result.profile.unwrap().id, "child_2");
        assert_eq!(result.confidence, 0.9);
        assert_eq!(result.method, Some(IdentificationMethod::Face));
        assert!(result.settings.child_mode);
        assert_eq!(result.settings.voice_speed, "slightly_slow");
        assert_eq!(identifier.current_user().unwrap().id, "child_2");
    }

    #[tokio::test]
    async fn test_voice_first_then_fallbacks() {
        let (identifier, _) = identifier_with_family().await;

        let result = identifier.identify(&SignalBundle {
            voice_features: Some(VoiceFeatures {
                pitch: 120.0,
                ..Default::default()
            }),
            face_id: Some("face-bo".into()),
            ..Default::default()
        });
        assert_eq!(result.profile.unwrap().id, "adult_1");
        assert_eq!(result.confidence, 0.8);

        let result = identifier.identify(&SignalBundle {
            spoken_code: Some("Red Dragon".into()),
            ..Default::default()
        });
        assert_eq!(result.confidence, 1.0);
        assert_eq!(result.settings.content_filter, "none");
        assert_eq!(result.settings.user_name.as_deref(), Some("Alice"));
    }

    #[tokio::test]
    async fn test_miss_yields_child_safe_defaults() {
        let (identifier, _) = identifier_with_family().await;
        identifier.identify(&SignalBundle {
            user_id: Some("adult_1".into()),
            ..Default::default()
        });
        let result = identifier.identify(&SignalBundle {
            face_id: Some("stranger".into()),
            user_id: Some("nobody".into()),
            ..Default::default()
        });
        assert!(result.profile.is_none());
        assert_eq!(result.confidence, 0.0);
        assert!(result.settings.child_mode);
        assert_eq!(result.settings.content_filter, "strict");
        assert_eq!(result.settings.complexity, "simple");
        assert!(identifier.current_user().is_none());
    }

    #[tokio::test]
    async fn test_identification_refreshes_last_seen() {
        let (identifier, _) = identifier_with_family().await;
        let before = identifier.get("adult_1").unwrap().last_seen;
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        identifier.identify(&SignalBundle {
            user_id: Some("adult_1".into()),
            ..Default::default()
        });
        assert!(identifier.get("adult_1").unwrap().last_seen > before);
    }

    struct FailingStorage;

    #[async_trait]
    impl ProfileStorage for FailingStorage {
        async fn load_all(&self) -> Result<Vec<UserProfile>> {
            Err(AppError::Storage("unreadable".into()))
        }
        async fn save_all(&self, _profiles: &[UserProfile]) -> Result<()> {
            Err(AppError::Storage("read-only".into()))
        }
    }

    #[tokio::test]
    async fn test_persistence_failure_keeps_profile_in_memory() {
        let identifier = UserIdentifier::load(Arc::new(FailingStorage), &phrases()).await;
        let profile = identifier
            .create("Alice", UserType::Adult, None, None)
            .await
            .unwrap();
        assert_eq!(identifier.get(&profile.id).unwrap().name, "Alice");
        assert_eq!(identifier.list().len(), 1);
    }

    #[test]
    fn test_session_id_format() {
        assert!(new_moxie_session_id().starts_with("moxie_"));
    }
}
