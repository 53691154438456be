//! Thin adapter around `qdrant-client` to isolate API usage.
//!
//! One facade instance per collection; all instances share the same
//! underlying client connection. The facade concentrates the verbose
//! builder calls so the rest of the application stays decoupled from
//! `qdrant-client`.

use std::sync::Arc;

use qdrant_client::Payload;
use qdrant_client::Qdrant;
use qdrant_client::qdrant::{
    CreateCollectionBuilder, DeletePointsBuilder, Distance, Filter, HnswConfigDiffBuilder,
    PointId, PointStruct, PointsIdsList, ScrollPointsBuilder, SearchParamsBuilder,
    SearchPointsBuilder, UpsertPointsBuilder, Value as QValue, VectorParamsBuilder,
};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::config::{DistanceKind, RagConfig};
use crate::errors::RagError;
use crate::record::{DocPoint, RagHit};

/// A facade over one Qdrant collection.
pub struct QdrantFacade {
    client: Arc<Qdrant>,
    collection: String,
    dim: usize,
    hnsw_m: u64,
    distance: DistanceKind,
}

impl QdrantFacade {
    /// Creates a facade for `collection` sharing the given client.
    pub fn new(client: Arc<Qdrant>, cfg: &RagConfig, collection: &str) -> Self {
        Self {
            client,
            collection: collection.to_string(),
            dim: cfg.embedding_dim,
            hnsw_m: cfg.hnsw_m,
            distance: cfg.distance,
        }
    }

    /// The collection name this facade targets.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Whether the collection currently exists.
    pub async fn exists(&self) -> Result<bool, RagError> {
        self.client
            .collection_exists(&self.collection)
            .await
            .map_err(|e| RagError::Qdrant(e.to_string()))
    }

    /// Ensures the collection exists, creating it when missing.
    pub async fn ensure_collection(&self) -> Result<(), RagError> {
        if self.exists().await? {
            debug!("Collection '{}' already exists", self.collection);
            return Ok(());
        }
        self.create_collection().await
    }

    /// Drops the collection (best effort) and recreates it.
    ///
    /// Used when durable state and store contents can no longer be
    /// reconciled and a clean index is the only safe option.
    pub async fn reset_collection(&self) -> Result<(), RagError> {
        warn!("Resetting collection '{}'", self.collection);
        let _ = self.client.delete_collection(&self.collection).await;
        self.create_collection().await
    }

    async fn create_collection(&self) -> Result<(), RagError> {
        let distance = match self.distance {
            DistanceKind::Cosine => Distance::Cosine,
            DistanceKind::Dot => Distance::Dot,
            DistanceKind::Euclid => Distance::Euclid,
        };

        info!(
            "Creating collection '{}' (dim={}, hnsw_m={})",
            self.collection, self.dim, self.hnsw_m
        );

        self.client
            .create_collection(
                CreateCollectionBuilder::new(&self.collection)
                    .vectors_config(VectorParamsBuilder::new(self.dim as u64, distance))
                    .hnsw_config(HnswConfigDiffBuilder::default().m(self.hnsw_m)),
            )
            .await
            .map_err(|e| RagError::Qdrant(e.to_string()))?;
        Ok(())
    }

    /// Upserts a batch of document-chunk points.
    ///
    /// # Errors
    /// Returns `RagError::VectorSizeMismatch` before any network call when
    /// a vector has the wrong dimensionality.
    pub async fn upsert_doc_points(&self, points: Vec<DocPoint>) -> Result<(), RagError> {
        if points.is_empty() {
            debug!("No points provided for upsert");
            return Ok(());
        }

        let mut converted = Vec::with_capacity(points.len());
        for p in points {
            if p.vector.len() != self.dim {
                return Err(RagError::VectorSizeMismatch {
                    got: p.vector.len(),
                    want: self.dim,
                });
            }
            let payload: Payload = json!({
                "source": p.payload.source,
                "section": p.payload.section,
                "content": p.payload.content,
            })
            .try_into()
            .map_err(|e| RagError::Qdrant(format!("payload convert: {e}")))?;
            converted.push(PointStruct::new(p.id, p.vector, payload));
        }

        info!(
            "Upserting {} points into collection '{}'",
            converted.len(),
            self.collection
        );

        self.client
            .upsert_points(UpsertPointsBuilder::new(&self.collection, converted))
            .await
            .map_err(|e| RagError::Qdrant(e.to_string()))?;
        Ok(())
    }

    /// Upserts a single point with an arbitrary JSON payload (history and
    /// fact records).
    pub async fn upsert_payload_point(
        &self,
        id: String,
        vector: Vec<f32>,
        payload: serde_json::Value,
    ) -> Result<(), RagError> {
        if vector.len() != self.dim {
            return Err(RagError::VectorSizeMismatch {
                got: vector.len(),
                want: self.dim,
            });
        }
        let payload: Payload = payload
            .try_into()
            .map_err(|e| RagError::Qdrant(format!("payload convert: {e}")))?;
        let point = PointStruct::new(id, vector, payload);

        self.client
            .upsert_points(UpsertPointsBuilder::new(&self.collection, vec![point]))
            .await
            .map_err(|e| RagError::Qdrant(e.to_string()))?;
        Ok(())
    }

    /// Deletes points by explicit ID list.
    pub async fn delete_by_ids(&self, ids: &[String]) -> Result<(), RagError> {
        if ids.is_empty() {
            return Ok(());
        }
        info!(
            "Deleting {} points from collection '{}'",
            ids.len(),
            self.collection
        );
        let ids: Vec<PointId> = ids.iter().map(|id| PointId::from(id.clone())).collect();
        self.client
            .delete_points(
                DeletePointsBuilder::new(&self.collection).points(PointsIdsList { ids }),
            )
            .await
            .map_err(|e| RagError::Qdrant(e.to_string()))?;
        Ok(())
    }

    /// Deletes points matching a payload filter.
    pub async fn delete_by_filter(&self, filter: Filter) -> Result<(), RagError> {
        self.client
            .delete_points(DeletePointsBuilder::new(&self.collection).points(filter))
            .await
            .map_err(|e| RagError::Qdrant(e.to_string()))?;
        Ok(())
    }

    /// Deletes every point whose payload `source` equals the given path.
    ///
    /// Fallback for cleaning a file's chunks when the recorded ID list
    /// cannot be trusted.
    pub async fn delete_by_source(&self, source: &str) -> Result<(), RagError> {
        self.delete_by_filter(crate::filters::source_filter(source))
            .await
    }

    /// Performs a similarity search, returning hits sorted by score.
    pub async fn search(
        &self,
        vector: Vec<f32>,
        top_k: u64,
        filter: Option<Filter>,
        hnsw_ef: Option<u64>,
    ) -> Result<Vec<RagHit>, RagError> {
        debug!(
            "Searching '{}' with top_k={} filtered={}",
            self.collection,
            top_k,
            filter.is_some()
        );

        let mut builder =
            SearchPointsBuilder::new(&self.collection, vector, top_k).with_payload(true);
        if let Some(f) = filter {
            builder = builder.filter(f);
        }
        if let Some(ef) = hnsw_ef {
            builder = builder.params(SearchParamsBuilder::default().hnsw_ef(ef));
        }

        let res = self
            .client
            .search_points(builder)
            .await
            .map_err(|e| RagError::Qdrant(e.to_string()))?;

        let mut out = Vec::with_capacity(res.result.len());
        for r in res.result {
            let payload = qpayload_to_json(r.payload);
            let content = payload
                .get("content")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            out.push(RagHit {
                score: r.score,
                content,
                payload,
            });
        }
        Ok(out)
    }

    /// Scrolls points matching a filter (payloads only, no vectors).
    pub async fn scroll(
        &self,
        filter: Filter,
        limit: u32,
    ) -> Result<Vec<serde_json::Value>, RagError> {
        let res = self
            .client
            .scroll(
                ScrollPointsBuilder::new(&self.collection)
                    .filter(filter)
                    .limit(limit)
                    .with_payload(true)
                    .with_vectors(false),
            )
            .await
            .map_err(|e| RagError::Qdrant(e.to_string()))?;

        Ok(res.result.into_iter().map(|p| qpayload_to_json(p.payload)).collect())
    }

    /// Number of points currently stored in the collection.
    pub async fn point_count(&self) -> Result<u64, RagError> {
        let info = self
            .client
            .collection_info(&self.collection)
            .await
            .map_err(|e| RagError::Qdrant(e.to_string()))?;
        Ok(info.result.and_then(|r| r.points_count).unwrap_or(0))
    }
}

/// Converts a Qdrant payload map into JSON.
///
/// Nested structs/lists are not part of this system's payloads; they fall
/// back to `Null`.
fn qpayload_to_json(p: std::collections::HashMap<String, QValue>) -> serde_json::Value {
    use qdrant_client::qdrant::value::Kind as K;
    let mut m = serde_json::Map::new();
    for (k, v) in p {
        let j = match v.kind {
            Some(K::StringValue(s)) => serde_json::Value::String(s),
            Some(K::IntegerValue(i)) => serde_json::Value::Number(i.into()),
            Some(K::DoubleValue(f)) => json!(f),
            Some(K::BoolValue(b)) => serde_json::Value::Bool(b),
            _ => serde_json::Value::Null,
        };
        m.insert(k, j);
    }
    serde_json::Value::Object(m)
}
