//! Payload filter construction for scoped queries.

use qdrant_client::qdrant::{Condition, Filter};

/// Exact-match filter on `session_id` (history and facts collections).
pub fn session_filter(session_id: &str) -> Filter {
    Filter::must([Condition::matches(
        "session_id",
        session_id.to_string(),
    )])
}

/// Exact-match filter on `source` (document chunks of one corpus file).
pub fn source_filter(source: &str) -> Filter {
    Filter::must([Condition::matches("source", source.to_string())])
}
