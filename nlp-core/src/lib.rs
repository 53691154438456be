//! Parsed-document model and linguistic rules shared across the backend.
//!
//! The heavy lifting (tokenization, tagging, dependency parsing, sentence
//! segmentation) happens in an external parse service. This crate provides:
//! - The wire/data model for parsed documents ([`ParsedDoc`], [`Token`]).
//! - A [`ParseProvider`] trait plus the HTTP client implementation, so
//!   callers (and tests) can substitute their own engine.
//! - User-fact extraction rules operating on parsed sentences.

mod doc;
mod engine;
mod errors;
mod facts;

pub use doc::{ParsedDoc, SentSpan, SentenceView, Token};
pub use engine::{HttpParseEngine, ParseEngineConfig, ParseProvider};
pub use errors::NlpError;
pub use facts::{extract_facts, extract_user_facts, preprocess_text};
