//! The write seam between the corpus indexer and the vector store.
//!
//! The synchronizer's state machine is specified against this trait so its
//! properties (idempotence, deletion propagation, state/store consistency)
//! can be exercised with an in-memory implementation.

use async_trait::async_trait;

use crate::errors::RagError;
use crate::qdrant_facade::QdrantFacade;
use crate::record::DocPoint;

/// Vector-index operations the indexing run needs.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Whether the underlying collection exists.
    async fn exists(&self) -> Result<bool, RagError>;

    /// Creates the collection when missing.
    async fn ensure_collection(&self) -> Result<(), RagError>;

    /// Drops and recreates the collection.
    async fn reset_collection(&self) -> Result<(), RagError>;

    /// Upserts one batch of points.
    async fn upsert(&self, points: Vec<DocPoint>) -> Result<(), RagError>;

    /// Deletes points by ID.
    async fn delete_ids(&self, ids: &[String]) -> Result<(), RagError>;

    /// Current point count.
    async fn point_count(&self) -> Result<u64, RagError>;
}

#[async_trait]
impl VectorIndex for QdrantFacade {
    async fn exists(&self) -> Result<bool, RagError> {
        QdrantFacade::exists(self).await
    }

    async fn ensure_collection(&self) -> Result<(), RagError> {
        QdrantFacade::ensure_collection(self).await
    }

    async fn reset_collection(&self) -> Result<(), RagError> {
        QdrantFacade::reset_collection(self).await
    }

    async fn upsert(&self, points: Vec<DocPoint>) -> Result<(), RagError> {
        self.upsert_doc_points(points).await
    }

    async fn delete_ids(&self, ids: &[String]) -> Result<(), RagError> {
        self.delete_by_ids(ids).await
    }

    async fn point_count(&self) -> Result<u64, RagError> {
        QdrantFacade::point_count(self).await
    }
}
