//! docmerge entry point.
//!
//! Reads one JSON document per line from stdin, merges each against the
//! stored observations of its URL and writes the merged document to stdout.
//! Logging goes to stderr so stdout stays machine-readable.

use std::sync::Arc;

use anyhow::Result;
use docmerge_core::{AppConfig, DocumentProcessor, DocumentStore, cache};
use tokio::io::{BufReader, stdin, stdout};
use tracing_subscriber::EnvFilter;

mod ingest;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    tracing::info!(
        db_path = %config.store.db_path.display(),
        cache_backend = ?config.cache.backend,
        "Starting docmerge"
    );

    let store = DocumentStore::connect(&config.store).await?;
    let cache = cache::connect(&config.cache).await?;
    let processor = DocumentProcessor::from_config(Arc::new(store), cache, &config);

    let summary = ingest::run(&processor, BufReader::new(stdin()), stdout()).await?;
    tracing::info!(merged = summary.merged, skipped = summary.skipped, failed = summary.failed, "Finished");

    Ok(())
}
