use std::sync::Arc;

use crate::clients::{HttpChatModel, HttpEmbedder, HttpSearchIndex};
use crate::core::config::AppConfig;
use crate::core::errors::PipelineError;
use crate::history::{HistoryStore, SqliteHistoryStore};
use crate::pipeline::retriever::RetrieverConfig;
use crate::pipeline::{ContextRetriever, PromptAssembler, TurnOrchestrator};

/// Global application state shared across all routes.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub history: Arc<dyn HistoryStore>,
    pub orchestrator: Arc<TurnOrchestrator>,
}

impl AppState {
    /// Wires configuration into the HTTP clients, the history store, and the
    /// turn orchestrator.
    pub async fn initialize(config: AppConfig) -> Result<Arc<Self>, PipelineError> {
        let history: Arc<dyn HistoryStore> =
            Arc::new(SqliteHistoryStore::new(config.storage.db_path.clone()).await?);

        let embedder = Arc::new(HttpEmbedder::new(&config.embedding));
        let index = Arc::new(HttpSearchIndex::new(&config.search));
        let model = Arc::new(HttpChatModel::new(&config.model));

        let retriever = ContextRetriever::new(
            embedder,
            index,
            RetrieverConfig {
                top: config.search.top,
                max_context_chars: config.assistant.max_context_chars,
            },
        );
        let prompt = PromptAssembler::new(config.assistant.instructions.clone());

        let orchestrator = Arc::new(TurnOrchestrator::new(
            retriever,
            prompt,
            model,
            history.clone(),
            config.assistant.max_history_messages,
        ));

        Ok(Arc::new(Self {
            config,
            history,
            orchestrator,
        }))
    }
}
