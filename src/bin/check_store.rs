//! Operator probe: print point counts for the three collections.

use std::error::Error;
use std::sync::Arc;

use rag_store::{NoopEmbedder, RagConfig, RagStore};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenvy::dotenv().ok();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cfg = RagConfig::from_env()?;
    let dim = cfg.embedding_dim;
    let store = RagStore::new(cfg, Arc::new(NoopEmbedder { dim }))?;

    for facade in [store.docs(), store.history(), store.facts()] {
        match facade.point_count().await {
            Ok(count) => println!("{}: {count} points", facade.collection()),
            Err(e) => println!("{}: unavailable ({e})", facade.collection()),
        }
    }

    Ok(())
}
