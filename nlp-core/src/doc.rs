//! Data model for documents returned by the parse service.
//!
//! Labels follow the Universal Dependencies / Penn Treebank conventions the
//! engine emits (`pos` like `NOUN`, `tag` like `VBG`, `dep` like `nsubj`).
//! They are kept as strings on purpose: the engine owns the label inventory
//! and this crate only pattern-matches on the subset it cares about.

use serde::{Deserialize, Serialize};

/// One token of a parsed document.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Token {
    /// Surface form as it appeared in the text.
    pub text: String,
    /// Lemma (dictionary form).
    pub lemma: String,
    /// Coarse part-of-speech tag (`NOUN`, `VERB`, `PROPN`, ...).
    pub pos: String,
    /// Fine-grained tag (`VB`, `VBP`, `VBG`, ...).
    pub tag: String,
    /// Syntactic dependency label (`ROOT`, `nsubj`, `dobj`, ...).
    pub dep: String,
    /// Index of the head token within the document.
    pub head: usize,
    /// Whether the token consists of alphabetic characters.
    pub is_alpha: bool,
    /// Whether the token is punctuation.
    pub is_punct: bool,
}

/// Half-open token range of one sentence.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct SentSpan {
    pub start: usize,
    pub end: usize,
}

/// A fully parsed document: flat token list plus sentence boundaries.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ParsedDoc {
    pub tokens: Vec<Token>,
    pub sentences: Vec<SentSpan>,
}

impl ParsedDoc {
    /// Iterates over the sentences of the document.
    pub fn sentences(&self) -> impl Iterator<Item = SentenceView<'_>> {
        self.sentences.iter().map(move |span| SentenceView {
            doc: self,
            span: *span,
        })
    }

    /// Count of alphabetic tokens.
    pub fn alpha_count(&self) -> usize {
        self.tokens.iter().filter(|t| t.is_alpha).count()
    }

    /// Count of punctuation tokens.
    pub fn punct_count(&self) -> usize {
        self.tokens.iter().filter(|t| t.is_punct).count()
    }

    /// Count of tokens whose coarse tag is one of `poses`.
    pub fn pos_count(&self, poses: &[&str]) -> usize {
        self.tokens
            .iter()
            .filter(|t| poses.contains(&t.pos.as_str()))
            .count()
    }
}

/// Borrowed view over one sentence of a [`ParsedDoc`].
#[derive(Clone, Copy)]
pub struct SentenceView<'a> {
    doc: &'a ParsedDoc,
    span: SentSpan,
}

impl<'a> SentenceView<'a> {
    /// Tokens of this sentence, paired with their document-wide index.
    ///
    /// Spans are clamped to the token list; a malformed span from the
    /// engine yields an empty sentence rather than a panic.
    pub fn tokens(&self) -> impl Iterator<Item = (usize, &'a Token)> {
        let start = self.span.start.min(self.doc.tokens.len());
        let end = self.span.end.clamp(start, self.doc.tokens.len());
        self.doc.tokens[start..end]
            .iter()
            .enumerate()
            .map(move |(i, t)| (start + i, t))
    }

    /// The syntactic root of the sentence, if the engine marked one.
    pub fn root(&self) -> Option<(usize, &'a Token)> {
        self.tokens().find(|(_, t)| t.dep == "ROOT")
    }

    /// Direct dependents of the token at document index `head_idx`.
    pub fn children(&self, head_idx: usize) -> impl Iterator<Item = (usize, &'a Token)> {
        self.tokens()
            .filter(move |(i, t)| t.head == head_idx && *i != head_idx)
    }

    /// Whether any token's lowercased text equals `word`.
    pub fn contains_word(&self, word: &str) -> bool {
        self.tokens().any(|(_, t)| t.text.eq_ignore_ascii_case(word))
    }
}
