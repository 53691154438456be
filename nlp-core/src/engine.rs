//! HTTP client for the external dependency-parse service.
//!
//! The service contract is one endpoint: `POST {endpoint}/parse` with
//! `{"text": "..."}`, returning a [`ParsedDoc`] as JSON. Everything the
//! backend knows about language comes through this boundary.

use std::{future::Future, pin::Pin, time::Duration};

use serde::Serialize;
use tracing::debug;

use crate::doc::ParsedDoc;
use crate::errors::NlpError;

/// Asynchronous parse provider.
///
/// Implement this trait to plug in another engine (or a test fake).
pub trait ParseProvider: Send + Sync {
    /// Parses `text` into tokens and sentences.
    fn parse<'a>(
        &'a self,
        text: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<ParsedDoc, NlpError>> + Send + 'a>>;
}

/// Configuration for the HTTP parse engine.
#[derive(Clone, Debug)]
pub struct ParseEngineConfig {
    /// Base URL of the parse service, e.g. `http://localhost:8090`.
    pub endpoint: String,
    /// Optional request timeout in seconds.
    pub timeout_secs: Option<u64>,
}

/// Thin client for the parse service.
///
/// Reuses one `reqwest::Client` with a configurable timeout.
pub struct HttpParseEngine {
    client: reqwest::Client,
    url_parse: String,
}

#[derive(Serialize)]
struct ParseRequest<'a> {
    text: &'a str,
}

impl HttpParseEngine {
    /// Creates a new engine client from the given config.
    ///
    /// # Errors
    /// - [`NlpError::InvalidEndpoint`] if the endpoint is empty or lacks an
    ///   http/https scheme.
    /// - [`NlpError::Transport`] if the HTTP client cannot be built.
    pub fn new(cfg: ParseEngineConfig) -> Result<Self, NlpError> {
        let endpoint = cfg.endpoint.trim();
        if endpoint.is_empty()
            || !(endpoint.starts_with("http://") || endpoint.starts_with("https://"))
        {
            return Err(NlpError::InvalidEndpoint(cfg.endpoint));
        }

        let timeout = cfg
            .timeout_secs
            .map(Duration::from_secs)
            .unwrap_or_else(|| Duration::from_secs(30));

        let client = reqwest::Client::builder().timeout(timeout).build()?;
        let url_parse = format!("{}/parse", endpoint.trim_end_matches('/'));

        Ok(Self { client, url_parse })
    }
}

impl ParseProvider for HttpParseEngine {
    fn parse<'a>(
        &'a self,
        text: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<ParsedDoc, NlpError>> + Send + 'a>> {
        Box::pin(async move {
            debug!(text_len = text.len(), "POST {}", self.url_parse);

            let resp = self
                .client
                .post(&self.url_parse)
                .json(&ParseRequest { text })
                .send()
                .await?;

            if !resp.status().is_success() {
                let status = resp.status();
                let url = self.url_parse.clone();
                let body = resp.text().await.unwrap_or_default();
                let snippet: String = body.chars().take(200).collect();
                return Err(NlpError::HttpStatus {
                    status,
                    url,
                    snippet,
                });
            }

            resp.json::<ParsedDoc>()
                .await
                .map_err(|e| NlpError::Decode(e.to_string()))
        })
    }
}
