//! Unified error type for indexing runs.

use thiserror::Error;

/// Top-level error for corpus-indexer operations.
#[derive(Debug, Error)]
pub enum IndexError {
    /// I/O or filesystem errors.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing / serialization errors (state file).
    #[error("state parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// A document could not be converted to markup.
    #[error("conversion failed for {path}: {reason}")]
    Conversion { path: String, reason: String },

    /// Unsupported document extension.
    #[error("unsupported document type: {0}")]
    UnsupportedType(String),

    /// Vector-store failure surfaced from the store layer.
    #[error(transparent)]
    Store(#[from] rag_store::RagError),

    /// Invalid indexer configuration.
    #[error("config error: {0}")]
    Config(String),
}
