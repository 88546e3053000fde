use std::sync::Arc;
use tracing::info;

use crate::config::config::AppConfig;
use crate::error::Result;
use crate::observability::ObservabilityState;
use crate::security::auth::{ApiKeyAuth, Authenticator};
use crate::services::chat::ChatService;
use crate::services::executor::ModelExecutor;
use crate::services::identity::UserIdentifier;
use crate::services::moxie::{EmotionClassifier, ResponseEnhancer};
use crate::services::session::SessionStore;
use crate::storage::profile_storage::ProfileStorage;

/// Application state containing all shared services and security components
#[derive(Clone)]
pub struct AppState {
    /// Chat completion pipeline
    pub chat: Arc<ChatService>,
    /// Session store shared with the chat pipeline
    pub sessions: Arc<SessionStore>,
    /// User identification and profile store
    pub identifier: Arc<UserIdentifier>,
    /// Moxie response enhancer
    pub enhancer: Arc<ResponseEnhancer>,
    /// Authenticator for API key validation
    pub authenticator: Arc<dyn Authenticator>,
    /// Metrics and health checks
    pub observability: Arc<ObservabilityState>,
    pub config: Arc<AppConfig>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("chat", &"Arc<ChatService>")
            .field("sessions", &"Arc<SessionStore>")
            .field("identifier", &"Arc<UserIdentifier>")
            .field("enhancer", &"Arc<ResponseEnhancer>")
            .field("authenticator", &self.authenticator.authenticator_type())
            .field("environment", &self.config.environment)
            .finish()
    }
}

impl AppState {
    /// Create new application state
    pub fn new(
        chat: ChatService,
        identifier: UserIdentifier,
        authenticator: Box<dyn Authenticator>,
        observability: Arc<ObservabilityState>,
        config: AppConfig,
    ) -> Self {
        let chat = Arc::new(chat);
        Self {
            sessions: chat.sessions().clone(),
            enhancer: chat.enhancer().clone(),
            chat,
            identifier: Arc::new(identifier),
            authenticator: Arc::from(authenticator),
            observability,
            config: Arc::new(config),
        }
    }

    /// Wire every service from configuration
    pub async fn build(
        config: AppConfig,
        executor: Arc<dyn ModelExecutor>,
        profile_storage: Arc<dyn ProfileStorage>,
    ) -> Result<Self> {
        let classifier = Arc::new(EmotionClassifier::load(
            config.moxie.emotion_table.as_deref(),
        )?);
        let enhancer = Arc::new(ResponseEnhancer::new(
            classifier,
            config.moxie.emotion_detection,
        ));
        let sessions = Arc::new(SessionStore::in_memory(&config.session));
        let chat = ChatService::new(
            sessions,
            executor,
            enhancer,
            config.moxie.clone(),
            config.executor.default_max_turns,
        );

        let identifier =
            UserIdentifier::load(profile_storage, &config.identity.code_phrases).await;
        info!(profiles = identifier.list().len(), "user profiles loaded");

        let authenticator = ApiKeyAuth::new(config.security.api_key.clone());
        if !authenticator.is_required() {
            info!("no API key configured, endpoints are open");
        }

        Ok(Self::new(
            chat,
            identifier,
            Box::new(authenticator),
            Arc::new(ObservabilityState::new(env!("CARGO_PKG_VERSION"))),
            config,
        ))
    }
}
