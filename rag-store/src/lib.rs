//! Vector-store layer for the assistant: document chunks, session history,
//! and user facts, all living in Qdrant.
//!
//! The crate splits responsibilities into focused modules:
//! - [`qdrant_facade`]: thin adapter isolating all `qdrant-client` usage.
//! - [`index`]: the [`VectorIndex`] seam the corpus indexer writes through.
//! - [`retrieval`]: domain operations (context lookups, history append,
//!   fact store/fetch) used by the query path.

mod config;
mod embed;
mod errors;
mod filters;
mod index;
mod qdrant_facade;
mod record;
mod retrieval;

pub use config::{DistanceKind, RagConfig};
pub use embed::{Embedder, NoopEmbedder, ProfilesEmbedder};
pub use errors::RagError;
pub use index::VectorIndex;
pub use qdrant_facade::QdrantFacade;
pub use record::{DocPayload, DocPoint, RagHit};

use std::sync::Arc;

use qdrant_client::Qdrant;
use tracing::trace;

/// High-level facade wiring configuration, the Qdrant connection, and the
/// three collections.
///
/// One instance per process; share it via `Arc`.
pub struct RagStore {
    cfg: RagConfig,
    docs: Arc<QdrantFacade>,
    history: Arc<QdrantFacade>,
    facts: Arc<QdrantFacade>,
    embedder: Arc<dyn Embedder>,
}

impl RagStore {
    /// Constructs a new store from the given configuration and embedder.
    ///
    /// # Errors
    /// Returns `RagError::Config` if validation or client construction fails.
    pub fn new(cfg: RagConfig, embedder: Arc<dyn Embedder>) -> Result<Self, RagError> {
        trace!("RagStore::new docs={}", cfg.docs_collection);
        cfg.validate()?;

        let mut builder = Qdrant::from_url(&cfg.qdrant_url);
        if let Some(key) = &cfg.qdrant_api_key {
            builder = builder.api_key(key.clone());
        }
        let client = Arc::new(
            builder
                .build()
                .map_err(|e| RagError::Qdrant(e.to_string()))?,
        );

        Ok(Self {
            docs: Arc::new(QdrantFacade::new(client.clone(), &cfg, &cfg.docs_collection)),
            history: Arc::new(QdrantFacade::new(
                client.clone(),
                &cfg,
                &cfg.history_collection,
            )),
            facts: Arc::new(QdrantFacade::new(client, &cfg, &cfg.facts_collection)),
            embedder,
            cfg,
        })
    }

    /// The documents collection handle (used by the corpus indexer).
    pub fn docs(&self) -> &QdrantFacade {
        &self.docs
    }

    /// Shared handle to the documents collection, for callers that need
    /// to own it (the indexing run).
    pub fn docs_handle(&self) -> Arc<QdrantFacade> {
        self.docs.clone()
    }

    /// The history collection handle.
    pub fn history(&self) -> &QdrantFacade {
        &self.history
    }

    /// The facts collection handle.
    pub fn facts(&self) -> &QdrantFacade {
        &self.facts
    }

    /// Store-wide configuration.
    pub fn config(&self) -> &RagConfig {
        &self.cfg
    }

    /// Ensures the history and facts collections exist.
    ///
    /// The docs collection is managed by the indexing run instead.
    ///
    /// # Errors
    /// Returns `RagError::Qdrant` on client failures.
    pub async fn create_side_collections(&self) -> Result<(), RagError> {
        self.history.ensure_collection().await?;
        self.facts.ensure_collection().await?;
        Ok(())
    }

    /// Retrieves document context for a query: top-5 similarity hits over
    /// the corpus, newline-joined, plus their scores.
    pub async fn document_context(&self, query: &str) -> Result<(String, Vec<f32>), RagError> {
        retrieval::document_context(self, query).await
    }

    /// Retrieves prior Q/A context for a session: top-5 similarity hits
    /// filtered to `session_id`.
    pub async fn history_context(
        &self,
        query: &str,
        session_id: &str,
    ) -> Result<(String, Vec<f32>), RagError> {
        retrieval::history_context(self, query, session_id).await
    }

    /// Appends one completed Q/A pair to the session history.
    pub async fn add_to_history(
        &self,
        query: &str,
        answer: &str,
        session_id: &str,
        user_id: &str,
    ) -> Result<(), RagError> {
        retrieval::add_to_history(self, query, answer, session_id, user_id).await
    }

    /// Persists extracted user facts for a session.
    pub async fn store_user_facts(
        &self,
        facts: &[String],
        session_id: &str,
        source_query: &str,
    ) -> Result<(), RagError> {
        retrieval::store_user_facts(self, facts, session_id, source_query).await
    }

    /// Fetches up to `limit` stored facts for a session.
    ///
    /// Facts come back via a scroll over an exact session match; no
    /// ordering is guaranteed beyond the store's scroll order.
    pub async fn user_facts(&self, session_id: &str, limit: u32) -> Result<Vec<String>, RagError> {
        retrieval::user_facts(self, session_id, limit).await
    }

    pub(crate) fn embedder(&self) -> &dyn Embedder {
        self.embedder.as_ref()
    }
}
