use std::sync::Arc;

use crate::core::config::{AppPaths, ConfigService, Settings};
use crate::core::rate_limit::RateLimiter;
use crate::core::security::ApiKey;
use crate::history::HistoryStore;
use crate::llm::OpenAiProvider;
use crate::rag::RagService;
use crate::vector::PineconeIndex;

pub mod error;

use error::InitializationError;

/// Shared state handed to every route.
///
/// Holds the resolved settings, the history database, the RAG pipeline
/// and the per-client rate limiter.
#[derive(Clone)]
pub struct AppState {
    pub paths: Arc<AppPaths>,
    pub config: ConfigService,
    pub settings: Settings,
    pub api_key: ApiKey,
    pub rate_limiter: RateLimiter,
    pub history: HistoryStore,
    pub rag: RagService,
}

impl AppState {
    /// Loads configuration, opens the history database and connects the
    /// embedding/chat provider and the vector index.
    pub async fn initialize(paths: Arc<AppPaths>) -> Result<Arc<Self>, InitializationError> {
        let config = ConfigService::new(paths.clone());
        let settings = config
            .load_settings()
            .map_err(|e| InitializationError::Config(e.into()))?;

        let history = HistoryStore::new(paths.db_path.clone())
            .await
            .map_err(|e| InitializationError::History(e.into()))?;

        let llm = OpenAiProvider::new(&settings.llm)
            .map_err(|e| InitializationError::Llm(e.into()))?;
        let index = PineconeIndex::connect(&settings.vector)
            .await
            .map_err(|e| InitializationError::Vector(e.into()))?;

        let rag = RagService::new(Arc::new(llm), Arc::new(index), settings.rag.clone());

        Ok(Arc::new(Self::from_parts(paths, config, settings, history, rag)))
    }

    pub fn from_parts(
        paths: Arc<AppPaths>,
        config: ConfigService,
        settings: Settings,
        history: HistoryStore,
        rag: RagService,
    ) -> Self {
        let api_key = ApiKey::new(settings.server.api_key.clone());
        let rate_limiter = RateLimiter::new(
            settings.rate_limit.requests_per_minute,
            settings.rate_limit.burst,
        )
        .trusting_proxy_headers(settings.server.trust_proxy_headers);

        Self {
            paths,
            config,
            settings,
            api_key,
            rate_limiter,
            history,
            rag,
        }
    }
}
