//! The fusion engine: parallel fan-out and context combination.

use std::sync::Arc;
use std::sync::OnceLock;
use std::time::Instant;

use nlp_core::ParseProvider;
use rag_store::RagStore;
use regex::Regex;
use tracing::info;

use crate::errors::FusionError;
use crate::external::{ExternalFetcher, analyze_query};

/// Combined context for one query.
#[derive(Debug)]
pub struct FusedContext {
    /// Ordered, blank-line-collapsed context text.
    pub text: String,
    /// Best similarity score seen across all sources.
    pub top_score: f32,
}

/// Gathers context from history, documents, and external sources.
pub struct FusionEngine {
    store: Arc<RagStore>,
    parser: Arc<dyn ParseProvider>,
    fetcher: Arc<dyn ExternalFetcher>,
}

impl FusionEngine {
    pub fn new(
        store: Arc<RagStore>,
        parser: Arc<dyn ParseProvider>,
        fetcher: Arc<dyn ExternalFetcher>,
    ) -> Self {
        Self {
            store,
            parser,
            fetcher,
        }
    }

    /// Fuses context for a query: one parse, three concurrent lookups, a
    /// fixed combination order.
    ///
    /// All branches are awaited; there is no partial-result short-circuit.
    ///
    /// # Errors
    /// Propagates parse, retrieval, or fetch failures.
    pub async fn fuse(&self, query: &str, session_id: &str) -> Result<FusedContext, FusionError> {
        let parsed = self.parser.parse(&query.to_lowercase()).await?;
        let (sources, keywords) = analyze_query(&parsed);
        let reduced = keywords.join(" ");

        let history_fut = timed("history", self.store.history_context(&reduced, session_id));
        let docs_fut = timed("documents", self.store.document_context(&reduced));
        let external_fut = timed("external", self.fetcher.fetch(&sources, &keywords));

        let (history, docs, external) = tokio::join!(history_fut, docs_fut, external_fut);
        let (history_text, history_scores) = history?;
        let (docs_text, docs_scores) = docs?;
        let (external_text, external_scores) = external?;

        let top_score = history_scores
            .iter()
            .chain(docs_scores.iter())
            .chain(external_scores.iter())
            .fold(0.0f32, |acc, s| acc.max(*s));

        let text = combine_contexts(&[history_text, docs_text, external_text]);
        info!(%query, top_score, "query context fused");

        Ok(FusedContext { text, top_score })
    }
}

/// Awaits a branch future while measuring its elapsed time.
async fn timed<T, E>(
    name: &'static str,
    fut: impl Future<Output = Result<T, E>>,
) -> Result<T, E> {
    let start = Instant::now();
    let out = fut.await;
    info!(source = name, timing_s = start.elapsed().as_secs_f64(), "fetched context");
    out
}

fn newline_runs() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n+").unwrap())
}

/// Concatenates non-empty parts in their given order and collapses every
/// newline run to a single newline.
pub fn combine_contexts(parts: &[String]) -> String {
    let non_empty: Vec<&str> = parts
        .iter()
        .map(|p| p.as_str())
        .filter(|p| !p.is_empty())
        .collect();
    let combined = non_empty.join("\n\n");
    newline_runs()
        .replace_all(combined.trim(), "\n")
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_is_history_documents_external() {
        let out = combine_contexts(&[
            "history A".to_string(),
            "doc B".to_string(),
            "external C".to_string(),
        ]);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines, vec!["history A", "doc B", "external C"]);
    }

    #[test]
    fn empty_parts_are_skipped() {
        let out = combine_contexts(&[String::new(), "docs".to_string(), String::new()]);
        assert_eq!(out, "docs");
    }

    #[test]
    fn newline_runs_collapse() {
        let out = combine_contexts(&[
            "a\n\n\nb".to_string(),
            "c".to_string(),
        ]);
        assert_eq!(out, "a\nb\nc");
        assert!(!out.contains("\n\n"));
    }

    #[test]
    fn all_empty_gives_empty() {
        assert_eq!(combine_contexts(&[String::new(), String::new()]), "");
    }
}
