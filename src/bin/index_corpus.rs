//! One incremental indexing run: corpus directory → vector store.
//!
//! Only one instance may run at a time against the same corpus.

use std::error::Error;
use std::sync::Arc;

use corpus_indexer::{Indexer, IndexerConfig};
use llm_service::LlmServiceProfiles;
use llm_service::config::default_config::{chat_from_env, embedding_from_env};
use nlp_core::{HttpParseEngine, ParseEngineConfig};
use rag_store::{ProfilesEmbedder, RagConfig, RagStore};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenvy::dotenv().ok();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("starting corpus extraction, embedding, and storage");

    let llm = Arc::new(LlmServiceProfiles::new(
        chat_from_env()?,
        embedding_from_env()?,
    )?);

    let rag_cfg = RagConfig::from_env()?;
    let embedder = Arc::new(ProfilesEmbedder::new(llm, rag_cfg.embedding_dim));
    let store = Arc::new(RagStore::new(rag_cfg, embedder.clone())?);

    let parser = Arc::new(HttpParseEngine::new(ParseEngineConfig {
        endpoint: std::env::var("PARSE_ENGINE_URL")
            .unwrap_or_else(|_| "http://localhost:8090".to_string()),
        timeout_secs: Some(30),
    })?);

    let indexer = Indexer::new(
        IndexerConfig::from_env()?,
        store.docs_handle(),
        embedder,
        parser,
    );

    let outcome = indexer.run().await?;
    info!(
        processed = outcome.processed_files,
        upserted = outcome.upserted_points,
        deleted_files = outcome.deleted_files,
        failed_batches = outcome.failed_batches,
        "indexing run complete"
    );

    Ok(())
}
