//! Application error type for server startup and wiring.
//!
//! Protocol-level failures never surface here: they are reported to the
//! client in-band (error fields on typed responses, inline error
//! fragments) and the connection stays open.

use thiserror::Error;

/// Public application error type.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("missing required environment variable: {0}")]
    MissingEnv(&'static str),

    #[error("config error: {0}")]
    Config(String),

    #[error("failed to bind listener")]
    Bind(#[source] std::io::Error),

    #[error("server error")]
    Server(#[source] std::io::Error),

    #[error(transparent)]
    Llm(#[from] llm_service::error_handler::LlmError),

    #[error(transparent)]
    Store(#[from] rag_store::RagError),

    #[error(transparent)]
    Nlp(#[from] nlp_core::NlpError),

    #[error("credential store error: {0}")]
    Credentials(String),
}

/// Handy result alias used across the crate.
pub type AppResult<T> = Result<T, AppError>;
