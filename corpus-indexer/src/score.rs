//! Chunk quality scoring from linguistic features.
//!
//! A deterministic, pure function over the parse of a chunk. Chunks below
//! [`SCORE_THRESHOLD`] are discarded before embedding.

use nlp_core::{ParseProvider, ParsedDoc};
use tracing::warn;

/// Minimum score a chunk must reach to be embedded.
pub const SCORE_THRESHOLD: f32 = 0.3;

/// Scores a chunk's quality for retrieval, in `[0, 1]`.
pub fn score_chunk(doc: &ParsedDoc, text: &str) -> f32 {
    let mut score: f32 = 0.0;

    // Sentences: any prose gets a base.
    match doc.sentences.len() {
        n if n >= 3 => score += 0.3,
        2 => score += 0.2,
        1 => score += 0.1,
        _ => {}
    }

    // Alphabetic tokens: content density.
    let words = doc.alpha_count();
    match words {
        n if n >= 50 => score += 0.3,
        n if n >= 20 => score += 0.2,
        n if n >= 10 => score += 0.1,
        _ => {}
    }

    // Nouns/verbs: semantic richness.
    let nouns = doc.pos_count(&["NOUN", "PROPN"]);
    let verbs = doc.pos_count(&["VERB"]);
    if nouns >= 10 && verbs >= 5 {
        score += 0.4;
    } else if nouns >= 5 && verbs >= 2 {
        score += 0.3;
    } else if nouns >= 2 {
        score += 0.2;
    }

    // Fuller chunks retrieve better.
    if text.len() > 600 {
        score += 0.1;
    }

    // Penalties: over-punctuated or table-ish junk.
    let punct = doc.punct_count();
    if punct as f32 / words.max(1) as f32 > 0.3 {
        score -= 0.1;
    }
    if text.contains('|') && words < 20 {
        score = score.min(0.3);
    }
    if text.len() < 100 && words < 10 {
        score = score.min(0.2);
    }

    score.clamp(0.0, 1.0)
}

/// Parses and scores a chunk via the external engine.
///
/// Parser failure yields score 0.0 (discard) and never propagates.
pub async fn score_with(provider: &dyn ParseProvider, text: &str) -> f32 {
    match provider.parse(text).await {
        Ok(doc) => score_chunk(&doc, text),
        Err(e) => {
            warn!(error = %e, "parse failed on chunk, scoring 0.0");
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nlp_core::{SentSpan, Token};

    /// Builds a doc with the requested token profile.
    fn doc_with(sentences: usize, nouns: usize, verbs: usize, other: usize, punct: usize) -> ParsedDoc {
        let mut tokens = Vec::new();
        let push = |tokens: &mut Vec<Token>, pos: &str, alpha: bool, is_punct: bool| {
            tokens.push(Token {
                text: if is_punct { ",".into() } else { "word".into() },
                lemma: "word".into(),
                pos: pos.into(),
                tag: String::new(),
                dep: String::new(),
                head: 0,
                is_alpha: alpha,
                is_punct,
            });
        };
        for _ in 0..nouns {
            push(&mut tokens, "NOUN", true, false);
        }
        for _ in 0..verbs {
            push(&mut tokens, "VERB", true, false);
        }
        for _ in 0..other {
            push(&mut tokens, "ADJ", true, false);
        }
        for _ in 0..punct {
            push(&mut tokens, "PUNCT", false, true);
        }

        let total = tokens.len();
        let spans = if sentences == 0 {
            Vec::new()
        } else {
            // Sentence boundaries don't matter for scoring, only the count.
            (0..sentences)
                .map(|i| SentSpan {
                    start: i * total / sentences,
                    end: (i + 1) * total / sentences,
                })
                .collect()
        };
        ParsedDoc {
            tokens,
            sentences: spans,
        }
    }

    #[test]
    fn rich_prose_scores_high() {
        let doc = doc_with(3, 15, 8, 30, 4);
        let text = "x".repeat(700);
        let score = score_chunk(&doc, &text);
        assert!(score >= 0.9, "score={score}");
    }

    #[test]
    fn sparse_chunk_capped_at_point_two() {
        let doc = doc_with(1, 2, 0, 2, 0);
        let score = score_chunk(&doc, "tiny");
        assert!(score <= 0.2, "score={score}");
    }

    #[test]
    fn table_like_chunk_capped() {
        let doc = doc_with(1, 6, 2, 4, 2);
        let text = "a | b | c";
        let score = score_chunk(&doc, text);
        assert!(score <= 0.3, "score={score}");
    }

    #[test]
    fn over_punctuation_penalized() {
        let base = doc_with(2, 6, 3, 11, 0);
        let noisy = doc_with(2, 6, 3, 11, 10);
        let text = "x".repeat(200);
        assert!(score_chunk(&noisy, &text) < score_chunk(&base, &text));
    }

    #[test]
    fn scorer_is_monotone_in_richness() {
        let text = "x".repeat(300);
        let sparse = score_chunk(&doc_with(1, 2, 1, 5, 1), &text);
        let medium = score_chunk(&doc_with(2, 6, 3, 15, 1), &text);
        let rich = score_chunk(&doc_with(3, 12, 6, 35, 1), &text);
        assert!(sparse <= medium && medium <= rich, "{sparse} {medium} {rich}");
    }

    #[test]
    fn score_is_clamped() {
        let doc = doc_with(0, 0, 0, 0, 10);
        let score = score_chunk(&doc, "||");
        assert!((0.0..=1.0).contains(&score));
    }
}
