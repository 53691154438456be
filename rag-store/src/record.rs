//! Core data models stored in and returned from the vector store.

use serde::{Deserialize, Serialize};

/// Payload carried by one document-chunk point.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DocPayload {
    /// Source file path the chunk came from.
    pub source: String,
    /// Section heading, formatted as `"# Title"`.
    pub section: String,
    /// The chunk text itself.
    pub content: String,
}

/// A document-chunk point ready for upsert.
///
/// IDs are freshly generated UUIDs, never reused, so concurrent writers
/// cannot collide.
#[derive(Clone, Debug)]
pub struct DocPoint {
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: DocPayload,
}

/// A single retrieval hit with its similarity score.
#[derive(Clone, Debug)]
pub struct RagHit {
    pub score: f32,
    pub content: String,
    pub payload: serde_json::Value,
}
