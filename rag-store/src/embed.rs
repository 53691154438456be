//! Embedding provider seam.
//!
//! Retrieval and indexing only ever see this trait; the production
//! implementation delegates to [`llm_service::LlmServiceProfiles`].

use std::{future::Future, pin::Pin, sync::Arc};

use llm_service::LlmServiceProfiles;

use crate::errors::RagError;

/// Asynchronous embedding provider.
pub trait Embedder: Send + Sync {
    /// Embeds one text.
    fn embed<'a>(
        &'a self,
        text: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<f32>, RagError>> + Send + 'a>>;

    /// Embeds a batch of texts, preserving order.
    fn embed_batch<'a>(
        &'a self,
        texts: &'a [String],
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Vec<f32>>, RagError>> + Send + 'a>>;
}

/// Production embedder backed by the shared LLM service profiles.
pub struct ProfilesEmbedder {
    svc: Arc<LlmServiceProfiles>,
    dim: usize,
}

impl ProfilesEmbedder {
    /// Wraps the shared service; `dim` is enforced on every result.
    pub fn new(svc: Arc<LlmServiceProfiles>, dim: usize) -> Self {
        Self { svc, dim }
    }

    fn check_dim(&self, v: &[f32]) -> Result<(), RagError> {
        if v.len() != self.dim {
            return Err(RagError::VectorSizeMismatch {
                got: v.len(),
                want: self.dim,
            });
        }
        Ok(())
    }
}

/// Embedder that produces zero vectors of the configured dimension.
///
/// For tooling that only touches collection metadata (stats probes) and
/// for tests; never wire it into a real ingestion path.
pub struct NoopEmbedder {
    pub dim: usize,
}

impl Embedder for NoopEmbedder {
    fn embed<'a>(
        &'a self,
        _text: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<f32>, RagError>> + Send + 'a>> {
        Box::pin(async move { Ok(vec![0.0; self.dim]) })
    }

    fn embed_batch<'a>(
        &'a self,
        texts: &'a [String],
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Vec<f32>>, RagError>> + Send + 'a>> {
        Box::pin(async move { Ok(texts.iter().map(|_| vec![0.0; self.dim]).collect()) })
    }
}

impl Embedder for ProfilesEmbedder {
    fn embed<'a>(
        &'a self,
        text: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<f32>, RagError>> + Send + 'a>> {
        Box::pin(async move {
            let v = self.svc.embed(text).await?;
            self.check_dim(&v)?;
            Ok(v)
        })
    }

    fn embed_batch<'a>(
        &'a self,
        texts: &'a [String],
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Vec<f32>>, RagError>> + Send + 'a>> {
        Box::pin(async move {
            let vs = self.svc.embed_batch(texts).await?;
            for v in &vs {
                self.check_dim(v)?;
            }
            Ok(vs)
        })
    }
}
