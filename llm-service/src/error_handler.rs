//! Unified error handling for `llm-service`.
//!
//! One top-level [`LlmError`] for the whole crate, plus small helpers for
//! reading and validating environment variables.

use reqwest::StatusCode;
use thiserror::Error;

/// Unified result alias for the crate.
pub type Result<T> = std::result::Result<T, LlmError>;

/// Top-level error for LLM operations.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum LlmError {
    /// The profile's provider does not support the requested operation.
    #[error("invalid provider for this operation")]
    InvalidProvider,

    /// API key required but not configured.
    #[error("missing API key for provider")]
    MissingApiKey,

    /// Invalid endpoint (empty or missing http/https scheme).
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// Configuration/validation errors (startup).
    #[error("config error: {0}")]
    Config(String),

    /// Underlying HTTP transport error.
    #[error("transport error: {0}")]
    HttpTransport(#[from] reqwest::Error),

    /// Upstream returned a non-successful HTTP status.
    #[error("HTTP {status} from {url}: {snippet}")]
    HttpStatus {
        status: StatusCode,
        url: String,
        snippet: String,
    },

    /// Response payload could not be decoded as expected.
    #[error("decode error: {0}")]
    Decode(String),

    /// The completion response carried no choices.
    #[error("completion response contained no choices")]
    EmptyChoices,
}

/// Trims a response body down to a loggable snippet.
pub fn make_snippet(body: &str) -> String {
    const MAX: usize = 200;
    let trimmed = body.trim();
    if trimmed.len() <= MAX {
        trimmed.to_string()
    } else {
        let mut end = MAX;
        while end > 0 && !trimmed.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}…", &trimmed[..end])
    }
}

/// Fetches a required, non-empty environment variable.
///
/// # Errors
/// Returns [`LlmError::Config`] if the variable is absent or empty.
pub fn must_env(name: &'static str) -> Result<String> {
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(LlmError::Config(format!(
            "missing required environment variable: {name}"
        ))),
    }
}

/// Parses an optional `u32` from env (`Ok(None)` if unset/empty).
pub fn env_opt_u32(name: &'static str) -> Result<Option<u32>> {
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => v
            .parse::<u32>()
            .map(Some)
            .map_err(|_| LlmError::Config(format!("invalid number in {name}: expected u32"))),
        _ => Ok(None),
    }
}

/// Parses an optional `u64` from env (`Ok(None)` if unset/empty).
pub fn env_opt_u64(name: &'static str) -> Result<Option<u64>> {
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => v
            .parse::<u64>()
            .map(Some)
            .map_err(|_| LlmError::Config(format!("invalid number in {name}: expected u64"))),
        _ => Ok(None),
    }
}
