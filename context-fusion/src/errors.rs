//! Unified error type for fusion operations.

use thiserror::Error;

/// Top-level error for the fusion engine.
#[derive(Debug, Error)]
pub enum FusionError {
    /// Query analysis failed in the parse engine.
    #[error("parse error: {0}")]
    Parse(#[from] nlp_core::NlpError),

    /// A retrieval branch failed in the vector store.
    #[error("retrieval error: {0}")]
    Retrieval(#[from] rag_store::RagError),

    /// The external source fetcher failed.
    #[error("external fetch error: {0}")]
    External(String),
}
