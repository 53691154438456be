//! Unified error type for the crate.

use thiserror::Error;

/// Top-level error for parse-engine operations.
#[derive(Debug, Error)]
pub enum NlpError {
    /// Invalid parse-engine endpoint (empty or missing http/https).
    #[error("invalid parse engine endpoint: {0}")]
    InvalidEndpoint(String),

    /// Transport/HTTP client error.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-successful HTTP status from the parse service.
    #[error("unexpected HTTP status {status} from {url}: {snippet}")]
    HttpStatus {
        status: reqwest::StatusCode,
        url: String,
        snippet: String,
    },

    /// Response payload could not be decoded as a parsed document.
    #[error("failed to decode parse response: {0}")]
    Decode(String),
}
