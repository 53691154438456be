//! Incremental corpus indexing pipeline.
//!
//! Filesystem → conversion → chunking → scoring → embedding → vector
//! store, with a durable state snapshot so only new, changed, or deleted
//! files do work on each run.

pub mod chunker;
pub mod convert;
mod errors;
pub mod score;
pub mod state;
pub mod sync;

pub use errors::IndexError;
pub use sync::{SyncOutcome, run_sync};

use std::path::PathBuf;
use std::sync::Arc;

use nlp_core::ParseProvider;
use rag_store::{Embedder, VectorIndex};
use tracing::info;

/// Filesystem configuration for indexing runs.
#[derive(Clone, Debug)]
pub struct IndexerConfig {
    /// Directory scanned (recursively) for corpus documents.
    pub corpus_dir: PathBuf,
    /// Directory holding `state.json` and the conversion cache.
    pub index_dir: PathBuf,
    /// Upsert batch size.
    pub upsert_batch: usize,
}

impl IndexerConfig {
    /// Builds the config from `CORPUS_DIR` / `INDEX_DIR` env variables.
    ///
    /// # Errors
    /// Returns [`IndexError::Config`] when `CORPUS_DIR` is unset.
    pub fn from_env() -> Result<Self, IndexError> {
        let corpus_dir = std::env::var("CORPUS_DIR")
            .map_err(|_| IndexError::Config("CORPUS_DIR must be set".into()))?;
        let index_dir = std::env::var("INDEX_DIR").unwrap_or_else(|_| "vector_db".into());
        Ok(Self {
            corpus_dir: PathBuf::from(corpus_dir),
            index_dir: PathBuf::from(index_dir),
            upsert_batch: 1000,
        })
    }

    /// Path of the durable state snapshot.
    pub fn state_path(&self) -> PathBuf {
        self.index_dir.join("state.json")
    }

    /// Directory for cached document conversions.
    pub fn cache_dir(&self) -> PathBuf {
        self.index_dir.join("cache")
    }
}

/// Owns the collaborators an indexing run needs.
///
/// Only one run may execute at a time against the same corpus; this is
/// operational discipline, not enforced by a lock here.
pub struct Indexer {
    cfg: IndexerConfig,
    index: Arc<dyn VectorIndex>,
    embedder: Arc<dyn Embedder>,
    parser: Arc<dyn ParseProvider>,
}

impl Indexer {
    pub fn new(
        cfg: IndexerConfig,
        index: Arc<dyn VectorIndex>,
        embedder: Arc<dyn Embedder>,
        parser: Arc<dyn ParseProvider>,
    ) -> Self {
        Self {
            cfg,
            index,
            embedder,
            parser,
        }
    }

    /// Runs one synchronization pass.
    ///
    /// # Errors
    /// See [`run_sync`].
    pub async fn run(&self) -> Result<SyncOutcome, IndexError> {
        info!(corpus = ?self.cfg.corpus_dir, "starting indexing run");
        run_sync(
            &self.cfg,
            self.index.as_ref(),
            self.embedder.as_ref(),
            self.parser.as_ref(),
        )
        .await
    }
}
