//! Context fusion for the query path.
//!
//! For each incoming query the engine analyzes the query once, fans out to
//! the three context sources in parallel (session history, document
//! retrieval, external stub), waits for all of them, and returns the
//! bounded, ordered combination together with the best similarity score
//! seen across sources.

mod errors;
mod external;
mod fuse;
pub mod prompt;

pub use errors::FusionError;
pub use external::{ExternalFetcher, MockFetcher, analyze_query};
pub use fuse::{FusedContext, FusionEngine, combine_contexts};
