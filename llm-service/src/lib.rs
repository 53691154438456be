//! Shared LLM service with two active profiles: `chat` and `embedding`.
//!
//! - Lives in the same Tokio runtime as the application.
//! - Construct once, wrap in `Arc`, and pass clones to dependents.
//! - Caches underlying HTTP clients per config (endpoint+model+key+timeout).
//! - Chat runs against an OpenAI-compatible server (vLLM and friends) in
//!   both streaming and non-streaming modes; embeddings run against either
//!   an OpenAI-compatible `/v1/embeddings` endpoint or an Ollama server.

pub mod config;
pub mod error_handler;
pub mod services;

use std::{collections::HashMap, sync::Arc};

use tokio::sync::{RwLock, mpsc};

use crate::config::llm_model_config::LlmModelConfig;
use crate::config::llm_provider::LlmProvider;
use crate::error_handler::LlmError;
use crate::services::ollama_service::OllamaService;
use crate::services::open_ai_service::{OpenAiCompatService, StreamEvent};

/// Shared service managing the **chat** and **embedding** profiles.
///
/// Internally caches provider clients keyed by their configuration so HTTP
/// clients are not recreated on each call.
pub struct LlmServiceProfiles {
    chat: LlmModelConfig,
    embedding: LlmModelConfig,

    openai: RwLock<HashMap<ClientKey, Arc<OpenAiCompatService>>>,
    ollama: RwLock<HashMap<ClientKey, Arc<OllamaService>>>,
}

impl LlmServiceProfiles {
    /// Creates a new service with the two profiles.
    ///
    /// The chat profile must target an OpenAI-compatible provider; the
    /// streaming protocol (SSE chat completions) is only defined there.
    ///
    /// # Errors
    /// Returns [`LlmError::InvalidProvider`] for an unsupported chat
    /// provider combination.
    pub fn new(chat: LlmModelConfig, embedding: LlmModelConfig) -> Result<Self, LlmError> {
        if chat.provider != LlmProvider::OpenAiCompat {
            return Err(LlmError::InvalidProvider);
        }
        Ok(Self {
            chat,
            embedding,
            openai: RwLock::new(HashMap::new()),
            ollama: RwLock::new(HashMap::new()),
        })
    }

    /// Performs a non-streaming chat completion with the **chat** profile.
    pub async fn chat(&self, system: &str, user: &str) -> Result<String, LlmError> {
        let cli = self.get_or_init_openai(&self.chat).await?;
        cli.chat(system, user).await
    }

    /// Starts a streaming chat completion with the **chat** profile.
    ///
    /// Returns a channel of [`StreamEvent`]s: zero or more `Delta`s,
    /// optionally one `Error`, then exactly one `Done`. Dropping the
    /// receiver cancels the upstream request.
    pub async fn chat_stream(
        &self,
        system: &str,
        user: &str,
    ) -> Result<mpsc::Receiver<StreamEvent>, LlmError> {
        let cli = self.get_or_init_openai(&self.chat).await?;
        cli.chat_stream(system, user).await
    }

    /// Computes one embedding vector with the **embedding** profile.
    pub async fn embed(&self, input: &str) -> Result<Vec<f32>, LlmError> {
        match self.embedding.provider {
            LlmProvider::OpenAiCompat => {
                let cli = self.get_or_init_openai(&self.embedding).await?;
                cli.embeddings(input).await
            }
            LlmProvider::Ollama => {
                let cli = self.get_or_init_ollama(&self.embedding).await?;
                cli.embeddings(input).await
            }
        }
    }

    /// Computes embeddings for a batch of texts, preserving input order.
    ///
    /// OpenAI-compatible backends receive array inputs (sub-batches of 256);
    /// Ollama backends are driven with bounded concurrency.
    pub async fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        match self.embedding.provider {
            LlmProvider::OpenAiCompat => {
                let cli = self.get_or_init_openai(&self.embedding).await?;
                cli.embeddings_batch(inputs).await
            }
            LlmProvider::Ollama => {
                let cli = self.get_or_init_ollama(&self.embedding).await?;
                cli.embeddings_batch(inputs, 4).await
            }
        }
    }

    /// Returns references to the current profiles `(chat, embedding)`.
    pub fn profiles(&self) -> (&LlmModelConfig, &LlmModelConfig) {
        (&self.chat, &self.embedding)
    }

    /* --------------------- Internals --------------------- */

    async fn get_or_init_openai(
        &self,
        cfg: &LlmModelConfig,
    ) -> Result<Arc<OpenAiCompatService>, LlmError> {
        let key = ClientKey::from(cfg);
        if let Some(cli) = self.openai.read().await.get(&key).cloned() {
            return Ok(cli);
        }
        let cli = Arc::new(OpenAiCompatService::new(cfg.clone())?);
        let mut w = self.openai.write().await;
        Ok(w.entry(key).or_insert(cli).clone())
    }

    async fn get_or_init_ollama(
        &self,
        cfg: &LlmModelConfig,
    ) -> Result<Arc<OllamaService>, LlmError> {
        let key = ClientKey::from(cfg);
        if let Some(cli) = self.ollama.read().await.get(&key).cloned() {
            return Ok(cli);
        }
        let cli = Arc::new(OllamaService::new(cfg.clone())?);
        let mut w = self.ollama.write().await;
        Ok(w.entry(key).or_insert(cli).clone())
    }
}

/// Cache key for provider clients.
#[derive(PartialEq, Eq, Hash)]
struct ClientKey {
    endpoint: String,
    model: String,
    api_key: Option<String>,
    timeout_secs: Option<u64>,
}

impl From<&LlmModelConfig> for ClientKey {
    fn from(cfg: &LlmModelConfig) -> Self {
        Self {
            endpoint: cfg.endpoint.clone(),
            model: cfg.model.clone(),
            api_key: cfg.api_key.clone(),
            timeout_secs: cfg.timeout_secs,
        }
    }
}
