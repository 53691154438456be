//! Query analysis and the external-source capability interface.
//!
//! Source selection is keyword-trigger matching against a small fixed
//! table; keyword reduction keeps the content-bearing tokens of the query
//! (by dependency role) and drops function words. The real fetcher is not
//! built yet, so a mock implementation synthesizes content behind the same
//! trait a production fetcher would implement.

use std::{future::Future, pin::Pin};

use nlp_core::ParsedDoc;
use tracing::info;

use crate::errors::FusionError;

/// One external data origin and the query words that trigger it.
struct SourceSpec {
    name: &'static str,
    triggers: &'static [&'static str],
}

/// Extensible source table; add new sources here.
const SOURCES: &[SourceSpec] = &[
    SourceSpec {
        name: "arXiv",
        triggers: &["latest", "paper", "research"],
    },
    SourceSpec {
        name: "MDN",
        triggers: &["doc", "syntax", "explain"],
    },
    SourceSpec {
        name: "GitHub",
        triggers: &["code", "example", "build"],
    },
];

/// Dependency roles that mark content-bearing keywords.
const KEYWORD_DEPS: &[&str] = &["amod", "nsubj", "dobj", "pobj", "compound", "npadvmod"];
/// Parts of speech excluded from keywords regardless of role.
const EXCLUDED_POS: &[&str] = &["PRON", "AUX", "DET", "ADP", "PUNCT", "VERB"];

/// Analyzes a parsed query: selects applicable external sources and
/// reduces the query to its keywords.
///
/// Compounds are kept only when their head word already made the list, so
/// stray modifiers don't leak in without their noun.
pub fn analyze_query(doc: &ParsedDoc) -> (Vec<String>, Vec<String>) {
    let mut keywords: Vec<String> = Vec::new();
    for token in &doc.tokens {
        if !KEYWORD_DEPS.contains(&token.dep.as_str())
            || EXCLUDED_POS.contains(&token.pos.as_str())
        {
            continue;
        }
        if token.dep == "compound" {
            let head_text = doc.tokens.get(token.head).map(|t| t.text.as_str());
            if head_text.is_none_or(|h| !keywords.iter().any(|k| k == h)) {
                continue;
            }
        }
        keywords.push(token.text.clone());
    }
    // Order-preserving dedup.
    let mut seen = std::collections::HashSet::new();
    keywords.retain(|k| seen.insert(k.clone()));

    let content_words: Vec<&str> = doc
        .tokens
        .iter()
        .filter(|t| matches!(t.pos.as_str(), "NOUN" | "VERB" | "ADJ"))
        .map(|t| t.text.as_str())
        .collect();

    let mut selected: Vec<String> = SOURCES
        .iter()
        .filter(|s| content_words.iter().any(|w| s.triggers.contains(w)))
        .map(|s| s.name.to_string())
        .collect();
    if selected.is_empty() {
        selected.push("GitHub".to_string());
    }

    (selected, keywords)
}

/// Capability interface for external content retrieval.
///
/// A production implementation can be substituted without touching the
/// fusion engine.
pub trait ExternalFetcher: Send + Sync {
    /// Fetches content for the given sources and keywords, returning the
    /// combined content and per-item similarity scores.
    fn fetch<'a>(
        &'a self,
        sources: &'a [String],
        keywords: &'a [String],
    ) -> Pin<Box<dyn Future<Output = Result<(String, Vec<f32>), FusionError>> + Send + 'a>>;
}

/// Stub fetcher synthesizing deterministic content for the first five
/// keywords.
pub struct MockFetcher {
    /// Baseline for the simulated scores (decays 0.1 per item).
    pub base_score: f32,
}

impl Default for MockFetcher {
    fn default() -> Self {
        Self { base_score: 0.0 }
    }
}

impl ExternalFetcher for MockFetcher {
    fn fetch<'a>(
        &'a self,
        sources: &'a [String],
        keywords: &'a [String],
    ) -> Pin<Box<dyn Future<Output = Result<(String, Vec<f32>), FusionError>> + Send + 'a>> {
        Box::pin(async move {
            info!(?sources, ?keywords, "mock external fetch");
            let joined = sources.join(", ");
            let lines: Vec<String> = keywords
                .iter()
                .take(5)
                .map(|kw| format!("External content from {joined} for {kw}"))
                .collect();
            let scores: Vec<f32> = (0..lines.len())
                .map(|i| self.base_score - 0.1 * i as f32)
                .collect();
            Ok((lines.join("\n"), scores))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nlp_core::{SentSpan, Token};

    fn tok(text: &str, pos: &str, dep: &str, head: usize) -> Token {
        Token {
            text: text.into(),
            lemma: text.into(),
            pos: pos.into(),
            tag: String::new(),
            dep: dep.into(),
            head,
            is_alpha: true,
            is_punct: false,
        }
    }

    fn doc(tokens: Vec<Token>) -> ParsedDoc {
        let end = tokens.len();
        ParsedDoc {
            tokens,
            sentences: vec![SentSpan { start: 0, end }],
        }
    }

    #[test]
    fn keywords_exclude_function_words() {
        // "how do I build a rust server"
        let d = doc(vec![
            tok("how", "SCONJ", "advmod", 3),
            tok("do", "AUX", "aux", 3),
            tok("i", "PRON", "nsubj", 3),
            tok("build", "VERB", "ROOT", 3),
            tok("a", "DET", "det", 6),
            tok("rust", "NOUN", "compound", 6),
            tok("server", "NOUN", "dobj", 3),
        ]);
        let (_, keywords) = analyze_query(&d);
        // "server" (dobj) passes; "rust" is a compound whose head arrives
        // later in token order, so it is skipped; pronouns/aux/verbs drop.
        assert_eq!(keywords, vec!["server".to_string()]);
    }

    #[test]
    fn compound_kept_when_head_already_collected() {
        let d = doc(vec![
            tok("server", "NOUN", "nsubj", 0),
            tok("rust", "NOUN", "compound", 0),
        ]);
        let (_, keywords) = analyze_query(&d);
        assert_eq!(keywords, vec!["server".to_string(), "rust".to_string()]);
    }

    #[test]
    fn trigger_words_select_sources() {
        // "explain the syntax" → MDN triggers on explain/syntax.
        let d = doc(vec![
            tok("explain", "VERB", "ROOT", 0),
            tok("the", "DET", "det", 2),
            tok("syntax", "NOUN", "dobj", 0),
        ]);
        let (sources, _) = analyze_query(&d);
        assert_eq!(sources, vec!["MDN".to_string()]);
    }

    #[test]
    fn default_source_is_github() {
        let d = doc(vec![tok("weather", "NOUN", "nsubj", 0)]);
        let (sources, _) = analyze_query(&d);
        assert_eq!(sources, vec!["GitHub".to_string()]);
    }

    #[tokio::test]
    async fn mock_fetcher_caps_at_five_keywords() {
        let fetcher = MockFetcher::default();
        let sources = vec!["GitHub".to_string()];
        let keywords: Vec<String> = (0..8).map(|i| format!("kw{i}")).collect();
        let (content, scores) = fetcher.fetch(&sources, &keywords).await.unwrap();
        assert_eq!(content.lines().count(), 5);
        assert_eq!(scores.len(), 5);
        assert!(content.starts_with("External content from GitHub for kw0"));
    }
}
