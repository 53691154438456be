//! Runtime and collection configuration.

use crate::errors::RagError;

/// Distance function used for the vector space.
#[derive(Clone, Copy, Debug)]
pub enum DistanceKind {
    /// Cosine distance (recommended for most embeddings).
    Cosine,
    /// Dot product (useful for normalized vectors).
    Dot,
    /// Euclidean distance (L2).
    Euclid,
}

/// Configuration for the vector store and its three collections.
#[derive(Clone, Debug)]
pub struct RagConfig {
    /// Qdrant endpoint, e.g. `http://localhost:6334`.
    pub qdrant_url: String,
    /// Optional API key for Qdrant Cloud.
    pub qdrant_api_key: Option<String>,
    /// Collection holding document chunks.
    pub docs_collection: String,
    /// Collection holding session Q/A history.
    pub history_collection: String,
    /// Collection holding extracted user facts.
    pub facts_collection: String,
    /// Dimensionality of all stored vectors.
    pub embedding_dim: usize,
    /// HNSW graph connectivity passed through to collection creation.
    pub hnsw_m: u64,
    /// Search-time HNSW beam width for document retrieval.
    pub hnsw_ef: u64,
    /// Distance function (Cosine by default).
    pub distance: DistanceKind,
    /// Upsert batch size for indexing runs.
    pub upsert_batch: usize,
}

impl RagConfig {
    /// Creates a default config for a given Qdrant endpoint.
    pub fn new_default(url: impl Into<String>) -> Self {
        Self {
            qdrant_url: url.into(),
            qdrant_api_key: None,
            docs_collection: "assistant_docs".into(),
            history_collection: "assistant_history".into(),
            facts_collection: "assistant_facts".into(),
            embedding_dim: 1024,
            hnsw_m: 32,
            hnsw_ef: 50,
            distance: DistanceKind::Cosine,
            upsert_batch: 1000,
        }
    }

    /// Builds the config from environment variables, falling back to the
    /// defaults above for anything unset.
    ///
    /// # Errors
    /// Returns `RagError::Config` for unparsable numeric variables.
    pub fn from_env() -> Result<Self, RagError> {
        let mut cfg = Self::new_default(
            std::env::var("QDRANT_URL").unwrap_or_else(|_| "http://localhost:6334".into()),
        );
        cfg.qdrant_api_key = std::env::var("QDRANT_API_KEY").ok().filter(|v| !v.is_empty());

        if let Ok(v) = std::env::var("DOCS_COLLECTION") {
            cfg.docs_collection = v;
        }
        if let Ok(v) = std::env::var("HISTORY_COLLECTION") {
            cfg.history_collection = v;
        }
        if let Ok(v) = std::env::var("FACTS_COLLECTION") {
            cfg.facts_collection = v;
        }
        if let Ok(v) = std::env::var("EMBEDDING_DIM") {
            cfg.embedding_dim = v
                .parse()
                .map_err(|_| RagError::Config("EMBEDDING_DIM must be a number".into()))?;
        }
        if let Ok(v) = std::env::var("HNSW_M") {
            cfg.hnsw_m = v
                .parse()
                .map_err(|_| RagError::Config("HNSW_M must be a number".into()))?;
        }

        cfg.validate()?;
        Ok(cfg)
    }

    /// Validates config values.
    pub fn validate(&self) -> Result<(), RagError> {
        if self.qdrant_url.trim().is_empty() {
            return Err(RagError::Config("qdrant_url is empty".into()));
        }
        for (name, value) in [
            ("docs_collection", &self.docs_collection),
            ("history_collection", &self.history_collection),
            ("facts_collection", &self.facts_collection),
        ] {
            if value.trim().is_empty() {
                return Err(RagError::Config(format!("{name} is empty")));
            }
        }
        if self.embedding_dim == 0 {
            return Err(RagError::Config("embedding_dim must be > 0".into()));
        }
        if self.upsert_batch == 0 {
            return Err(RagError::Config("upsert_batch must be > 0".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(RagConfig::new_default("http://localhost:6334").validate().is_ok());
    }

    #[test]
    fn empty_collection_rejected() {
        let mut cfg = RagConfig::new_default("http://localhost:6334");
        cfg.facts_collection = String::new();
        assert!(cfg.validate().is_err());
    }
}
