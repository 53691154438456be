//! OpenAI-compatible service for chat completions and embeddings.
//!
//! Works against any server speaking the OpenAI REST surface (vLLM in the
//! default deployment). Endpoints are derived from
//! `LlmModelConfig::endpoint`:
//! - POST {endpoint}/v1/chat/completions — chat (streaming and not)
//! - POST {endpoint}/v1/embeddings       — embeddings (single or array)
//!
//! Streaming uses the server-sent-event framing the protocol defines:
//! `data: {json}` lines terminated by the `data: [DONE]` sentinel.

use std::time::{Duration, Instant};

use futures::StreamExt;
use reqwest::header;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::config::llm_model_config::LlmModelConfig;
use crate::config::llm_provider::LlmProvider;
use crate::error_handler::{LlmError, make_snippet};

/// Maximum inputs per embeddings request; larger batches are split.
const EMBED_REQUEST_BATCH: usize = 256;

/// One event of a streaming chat completion.
#[derive(Debug)]
pub enum StreamEvent {
    /// Incremental text fragment, forwarded in arrival order.
    Delta(String),
    /// Terminal event; always sent exactly once.
    Done,
    /// Upstream failure; followed by `Done`.
    Error(String),
}

/// Thin client for an OpenAI-compatible API.
///
/// Constructed from a complete [`LlmModelConfig`]. Internally keeps a
/// preconfigured `reqwest::Client` with timeout and default headers.
#[derive(Debug)]
pub struct OpenAiCompatService {
    client: reqwest::Client,
    cfg: LlmModelConfig,
    url_chat: String,
    url_embeddings: String,
}

impl OpenAiCompatService {
    /// Creates a new service from the given config.
    ///
    /// # Errors
    /// - [`LlmError::InvalidProvider`] if `cfg.provider` is not OpenAI-compatible
    /// - [`LlmError::InvalidEndpoint`] if `cfg.endpoint` is invalid
    /// - [`LlmError::HttpTransport`] if the HTTP client cannot be built
    pub fn new(cfg: LlmModelConfig) -> Result<Self, LlmError> {
        if cfg.provider != LlmProvider::OpenAiCompat {
            return Err(LlmError::InvalidProvider);
        }

        let endpoint = cfg.endpoint.trim();
        if endpoint.is_empty()
            || !(endpoint.starts_with("http://") || endpoint.starts_with("https://"))
        {
            return Err(LlmError::InvalidEndpoint(cfg.endpoint.clone()));
        }

        let timeout = cfg
            .timeout_secs
            .map(Duration::from_secs)
            .unwrap_or_else(|| Duration::from_secs(60));

        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );
        if let Some(key) = &cfg.api_key {
            let value = header::HeaderValue::from_str(&format!("Bearer {key}"))
                .map_err(|e| LlmError::Decode(format!("invalid API key header: {e}")))?;
            headers.insert(header::AUTHORIZATION, value);
        }

        // Only the connect phase is bounded for streaming requests; the
        // overall timeout would cut long generations short.
        let client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .default_headers(headers)
            .build()?;

        let base = endpoint.trim_end_matches('/').to_string();
        let url_chat = format!("{base}/v1/chat/completions");
        let url_embeddings = format!("{base}/v1/embeddings");

        info!(
            model = %cfg.model,
            endpoint = %cfg.endpoint,
            "OpenAiCompatService initialized"
        );

        Ok(Self {
            client,
            cfg,
            url_chat,
            url_embeddings,
        })
    }

    /// Performs a non-streaming chat completion.
    ///
    /// # Errors
    /// - [`LlmError::HttpStatus`] for non-2xx responses
    /// - [`LlmError::HttpTransport`] for client/network failures
    /// - [`LlmError::Decode`] if the JSON cannot be parsed
    /// - [`LlmError::EmptyChoices`] if no choices are returned
    pub async fn chat(&self, system: &str, user: &str) -> Result<String, LlmError> {
        let started = Instant::now();
        let body = ChatCompletionRequest::from_cfg(&self.cfg, system, user, false);

        debug!(model = %self.cfg.model, "POST {}", self.url_chat);

        let resp = self.client.post(&self.url_chat).json(&body).send().await?;
        let resp = self.check_status(resp, &self.url_chat).await?;

        let out: ChatCompletionResponse = resp
            .json()
            .await
            .map_err(|e| LlmError::Decode(format!("chat completion response: {e}")))?;

        let content = out
            .choices
            .into_iter()
            .find_map(|c| c.message.and_then(|m| m.content))
            .ok_or(LlmError::EmptyChoices)?;

        info!(
            model = %self.cfg.model,
            latency_ms = started.elapsed().as_millis(),
            "chat completion completed"
        );
        Ok(content)
    }

    /// Starts a streaming chat completion.
    ///
    /// Events arrive on the returned channel in production order: zero or
    /// more [`StreamEvent::Delta`]s, at most one [`StreamEvent::Error`],
    /// and exactly one terminal [`StreamEvent::Done`]. Dropping the
    /// receiver aborts the relay task and with it the HTTP response
    /// stream, which cancels generation upstream.
    ///
    /// # Errors
    /// Fails fast with [`LlmError::HttpStatus`] or
    /// [`LlmError::HttpTransport`] when the request itself cannot be
    /// established; stream-phase failures are reported in-band.
    pub async fn chat_stream(
        &self,
        system: &str,
        user: &str,
    ) -> Result<mpsc::Receiver<StreamEvent>, LlmError> {
        let body = ChatCompletionRequest::from_cfg(&self.cfg, system, user, true);

        debug!(model = %self.cfg.model, "POST {} (stream)", self.url_chat);

        let resp = self.client.post(&self.url_chat).json(&body).send().await?;
        let resp = self.check_status(resp, &self.url_chat).await?;

        let (tx, rx) = mpsc::channel::<StreamEvent>(32);
        tokio::spawn(async move {
            let mut stream = resp.bytes_stream();
            let mut pending = String::new();

            while let Some(next) = stream.next().await {
                let bytes = match next {
                    Ok(b) => b,
                    Err(e) => {
                        let _ = tx
                            .send(StreamEvent::Error(format!("inference stream failed: {e}")))
                            .await;
                        let _ = tx.send(StreamEvent::Done).await;
                        return;
                    }
                };

                pending.push_str(&String::from_utf8_lossy(&bytes));

                // SSE frames may split across network chunks; only complete
                // lines are parsed, the tail stays buffered.
                while let Some(pos) = pending.find('\n') {
                    let line: String = pending.drain(..=pos).collect();
                    let line = line.trim();
                    let Some(data) = line.strip_prefix("data: ") else {
                        continue;
                    };

                    if data == "[DONE]" {
                        let _ = tx.send(StreamEvent::Done).await;
                        return;
                    }

                    match serde_json::from_str::<ChatCompletionChunk>(data) {
                        Ok(chunk) => {
                            let content = chunk
                                .choices
                                .into_iter()
                                .find_map(|c| c.delta.content)
                                .unwrap_or_default();
                            if !content.is_empty()
                                && tx.send(StreamEvent::Delta(content)).await.is_err()
                            {
                                // Receiver gone: stop consuming, drop the
                                // response stream, cancel generation.
                                return;
                            }
                        }
                        Err(e) => {
                            warn!(error = %e, "skipping undecodable stream chunk");
                        }
                    }
                }
            }

            // Stream ended without the sentinel; still terminate cleanly.
            let _ = tx.send(StreamEvent::Done).await;
        });

        Ok(rx)
    }

    /// Retrieves a single embeddings vector.
    pub async fn embeddings(&self, input: &str) -> Result<Vec<f32>, LlmError> {
        let mut out = self.embeddings_batch(&[input.to_string()]).await?;
        out.pop().ok_or(LlmError::EmptyChoices)
    }

    /// Retrieves embeddings for a batch of inputs, preserving order.
    ///
    /// Inputs are sent as array requests in sub-batches of 256.
    pub async fn embeddings_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        let mut out: Vec<Vec<f32>> = Vec::with_capacity(inputs.len());

        for batch in inputs.chunks(EMBED_REQUEST_BATCH) {
            let body = EmbeddingsRequest {
                model: &self.cfg.model,
                input: batch,
            };

            let resp = self
                .client
                .post(&self.url_embeddings)
                .json(&body)
                .send()
                .await?;
            let resp = self.check_status(resp, &self.url_embeddings).await?;

            let parsed: EmbeddingsResponse = resp
                .json()
                .await
                .map_err(|e| LlmError::Decode(format!("embeddings response: {e}")))?;

            let mut rows = parsed.data;
            rows.sort_by_key(|r| r.index);
            if rows.len() != batch.len() {
                return Err(LlmError::Decode(format!(
                    "embeddings response row count {} != batch size {}",
                    rows.len(),
                    batch.len()
                )));
            }
            out.extend(rows.into_iter().map(|r| r.embedding));
        }

        Ok(out)
    }

    async fn check_status(
        &self,
        resp: reqwest::Response,
        url: &str,
    ) -> Result<reqwest::Response, LlmError> {
        if resp.status().is_success() {
            return Ok(resp);
        }
        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();
        let snippet = make_snippet(&text);
        error!(%status, %url, %snippet, "upstream returned non-success status");
        Err(LlmError::HttpStatus {
            status,
            url: url.to_string(),
            snippet,
        })
    }
}

/* --------------------------- Wire types --------------------------- */

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    stream: bool,
}

impl<'a> ChatCompletionRequest<'a> {
    fn from_cfg(cfg: &'a LlmModelConfig, system: &'a str, user: &'a str, stream: bool) -> Self {
        Self {
            model: &cfg.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            max_tokens: cfg.max_tokens,
            temperature: cfg.temperature,
            top_p: cfg.top_p,
            stream,
        }
    }
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatCompletionChunk {
    choices: Vec<ChunkChoice>,
}

#[derive(Deserialize)]
struct ChunkChoice {
    delta: ChunkDelta,
}

#[derive(Deserialize, Default)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingRow>,
}

#[derive(Deserialize)]
struct EmbeddingRow {
    index: usize,
    embedding: Vec<f32>,
}
