//! Domain retrieval operations: document context, session history, and
//! user facts.

use chrono::Utc;
use serde_json::json;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::RagStore;
use crate::errors::RagError;
use crate::filters::session_filter;

/// How many hits each context lookup returns.
const CONTEXT_TOP_K: u64 = 5;

/// Fetches RAG context from the docs collection: newline-joined chunk
/// contents plus their similarity scores.
pub async fn document_context(
    store: &RagStore,
    query: &str,
) -> Result<(String, Vec<f32>), RagError> {
    let vector = store.embedder().embed(query).await?;
    let hits = store
        .docs()
        .search(
            vector,
            CONTEXT_TOP_K,
            None,
            Some(store.config().hnsw_ef),
        )
        .await?;

    for hit in &hits {
        let preview: String = hit.content.chars().take(50).collect();
        debug!(score = hit.score, %preview, "document hit");
    }

    let scores: Vec<f32> = hits.iter().map(|h| h.score).collect();
    let content = hits
        .iter()
        .map(|h| h.content.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    Ok((content, scores))
}

/// Fetches prior Q/A context for a session.
pub async fn history_context(
    store: &RagStore,
    query: &str,
    session_id: &str,
) -> Result<(String, Vec<f32>), RagError> {
    let vector = store.embedder().embed(query).await?;
    let hits = store
        .history()
        .search(vector, CONTEXT_TOP_K, Some(session_filter(session_id)), None)
        .await?;

    let scores: Vec<f32> = hits.iter().map(|h| h.score).collect();
    let content = hits
        .iter()
        .map(|h| h.content.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    Ok((content, scores))
}

/// Appends one completed Q/A pair to the session history.
///
/// Records are insert-only; every call creates a fresh point.
pub async fn add_to_history(
    store: &RagStore,
    query: &str,
    answer: &str,
    session_id: &str,
    user_id: &str,
) -> Result<(), RagError> {
    let content = format!("Q: {query}\nA: {answer}");
    let vector = store.embedder().embed(&content).await?;

    store
        .history()
        .upsert_payload_point(
            Uuid::new_v4().to_string(),
            vector,
            json!({
                "content": content,
                "session_id": session_id,
                "user_id": user_id,
                "timestamp": Utc::now().timestamp(),
            }),
        )
        .await
}

/// Persists extracted user facts, one point per fact.
pub async fn store_user_facts(
    store: &RagStore,
    facts: &[String],
    session_id: &str,
    source_query: &str,
) -> Result<(), RagError> {
    for fact in facts {
        let vector = store.embedder().embed(fact).await?;
        let result = store
            .facts()
            .upsert_payload_point(
                Uuid::new_v4().to_string(),
                vector,
                json!({
                    "fact": fact,
                    "session_id": session_id,
                    "timestamp": Utc::now().timestamp(),
                    "source_query": source_query,
                }),
            )
            .await;

        match result {
            Ok(()) => info!(%fact, %session_id, "stored fact"),
            Err(e) => {
                error!(%fact, error = %e, "failed to store fact");
                return Err(e);
            }
        }
    }
    Ok(())
}

/// Retrieves up to `limit` stored facts for a session (exact match scroll,
/// no similarity ranking).
pub async fn user_facts(
    store: &RagStore,
    session_id: &str,
    limit: u32,
) -> Result<Vec<String>, RagError> {
    let payloads = store
        .facts()
        .scroll(session_filter(session_id), limit)
        .await?;

    let facts: Vec<String> = payloads
        .iter()
        .filter_map(|p| p.get("fact").and_then(|v| v.as_str()))
        .map(|s| s.to_string())
        .collect();

    info!(count = facts.len(), %session_id, "retrieved facts");
    Ok(facts)
}
