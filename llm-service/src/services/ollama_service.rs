//! Lightweight Ollama client used for the embedding profile.
//!
//! One endpoint matters here:
//! - `POST {endpoint}/api/embeddings` — single-input embeddings retrieval.
//!
//! Ollama has no array input form, so batches are driven with bounded
//! concurrency while preserving input order.

use std::time::Duration;

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::llm_model_config::LlmModelConfig;
use crate::config::llm_provider::LlmProvider;
use crate::error_handler::{LlmError, make_snippet};

/// Thin client for Ollama embeddings.
pub struct OllamaService {
    client: reqwest::Client,
    cfg: LlmModelConfig,
    url_embeddings: String,
}

impl OllamaService {
    /// Creates a new service from the given config.
    ///
    /// # Errors
    /// - [`LlmError::InvalidProvider`] if `cfg.provider` is not `Ollama`
    /// - [`LlmError::InvalidEndpoint`] if `cfg.endpoint` is invalid
    /// - [`LlmError::HttpTransport`] if the HTTP client cannot be built
    pub fn new(cfg: LlmModelConfig) -> Result<Self, LlmError> {
        if cfg.provider != LlmProvider::Ollama {
            return Err(LlmError::InvalidProvider);
        }

        let endpoint = cfg.endpoint.trim();
        if endpoint.is_empty()
            || !(endpoint.starts_with("http://") || endpoint.starts_with("https://"))
        {
            return Err(LlmError::InvalidEndpoint(cfg.endpoint));
        }

        let timeout = cfg
            .timeout_secs
            .map(Duration::from_secs)
            .unwrap_or_else(|| Duration::from_secs(60));

        let client = reqwest::Client::builder().timeout(timeout).build()?;
        let url_embeddings = format!("{}/api/embeddings", endpoint.trim_end_matches('/'));

        info!(model = %cfg.model, endpoint = %cfg.endpoint, "OllamaService initialized");

        Ok(Self {
            client,
            cfg,
            url_embeddings,
        })
    }

    /// Retrieves a single embeddings vector.
    ///
    /// # Errors
    /// - [`LlmError::HttpStatus`] for non-2xx responses
    /// - [`LlmError::HttpTransport`] for transport failures
    /// - [`LlmError::Decode`] for malformed payloads
    pub async fn embeddings(&self, input: &str) -> Result<Vec<f32>, LlmError> {
        debug!(input_len = input.len(), "POST {}", self.url_embeddings);

        let body = EmbeddingsRequest {
            model: &self.cfg.model,
            prompt: input,
        };

        let resp = self
            .client
            .post(&self.url_embeddings)
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(LlmError::HttpStatus {
                status,
                url: self.url_embeddings.clone(),
                snippet: make_snippet(&text),
            });
        }

        let parsed: EmbeddingsResponse = resp
            .json()
            .await
            .map_err(|e| LlmError::Decode(format!("embeddings response: {e}")))?;
        Ok(parsed.embedding)
    }

    /// Retrieves embeddings for a batch of inputs with bounded concurrency,
    /// preserving input order.
    pub async fn embeddings_batch(
        &self,
        inputs: &[String],
        concurrency: usize,
    ) -> Result<Vec<Vec<f32>>, LlmError> {
        let mut rows: Vec<(usize, Vec<f32>)> = stream::iter(0..inputs.len())
            .map(|i| async move {
                let v = self.embeddings(inputs[i].as_str()).await?;
                Ok::<(usize, Vec<f32>), LlmError>((i, v))
            })
            .buffer_unordered(concurrency.max(1))
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .collect::<Result<Vec<_>, LlmError>>()?;

        rows.sort_by_key(|(i, _)| *i);
        Ok(rows.into_iter().map(|(_, v)| v).collect())
    }
}

#[derive(Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    embedding: Vec<f32>,
}
