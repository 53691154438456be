//! Shared state for all connection handlers.
//!
//! Every external collaborator is an explicitly constructed, injected
//! dependency held here: one process-wide instance of each, shared by
//! `Arc`, substitutable in tests.

use std::path::Path;
use std::sync::Arc;

use context_fusion::{FusionEngine, MockFetcher};
use llm_service::LlmServiceProfiles;
use llm_service::config::default_config::{chat_from_env, embedding_from_env};
use nlp_core::{HttpParseEngine, ParseEngineConfig, ParseProvider};
use rag_store::{ProfilesEmbedder, RagConfig, RagStore};

use crate::auth::{CredentialStore, FileCredentialStore};
use crate::error_handler::AppError;

/// Shared state for the WebSocket handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<RagStore>,
    pub llm: Arc<LlmServiceProfiles>,
    pub fusion: Arc<FusionEngine>,
    pub parser: Arc<dyn ParseProvider>,
    pub credentials: Arc<dyn CredentialStore>,
}

impl AppState {
    /// Builds the full dependency graph from environment variables.
    ///
    /// # Errors
    /// Returns [`AppError`] when any collaborator fails to configure.
    pub fn from_env() -> Result<Self, AppError> {
        let llm = Arc::new(LlmServiceProfiles::new(
            chat_from_env()?,
            embedding_from_env()?,
        )?);

        let rag_cfg = RagConfig::from_env()?;
        let embedder = Arc::new(ProfilesEmbedder::new(llm.clone(), rag_cfg.embedding_dim));
        let store = Arc::new(RagStore::new(rag_cfg, embedder)?);

        let parser: Arc<dyn ParseProvider> = Arc::new(HttpParseEngine::new(ParseEngineConfig {
            endpoint: std::env::var("PARSE_ENGINE_URL")
                .unwrap_or_else(|_| "http://localhost:8090".to_string()),
            timeout_secs: Some(30),
        })?);

        let fusion = Arc::new(FusionEngine::new(
            store.clone(),
            parser.clone(),
            Arc::new(MockFetcher::default()),
        ));

        let users_file =
            std::env::var("USERS_FILE").unwrap_or_else(|_| "users.json".to_string());
        let credentials: Arc<dyn CredentialStore> =
            Arc::new(FileCredentialStore::load(Path::new(&users_file))?);

        Ok(Self {
            store,
            llm,
            fusion,
            parser,
            credentials,
        })
    }
}
