//! Bundled [`StorageBackend`](super::backend::StorageBackend) and
//! [`Embedder`](super::embedding::Embedder) implementations, and the factory
//! that picks them from configuration.

mod in_memory;
mod postgres;

pub use in_memory::InMemoryBackend;
pub use postgres::PostgresBackend;

use super::backend::StorageBackend;
use super::embedding::{CachedEmbedder, Embedder, FastEmbedder, HashEmbedder, OpenAiEmbedder};
use crate::config::{EmbeddingConfig, MemorySettings, PersistenceConfig};
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

/// Connect the storage backend named by `persistence.provider`.
///
/// - `memory` (default): process-local [`InMemoryBackend`]
/// - `postgres`: [`PostgresBackend`], requires `persistence.database_url`
pub async fn connect_backend(
    persistence: &PersistenceConfig,
    memory: &MemorySettings,
) -> Result<Arc<dyn StorageBackend>> {
    match persistence.provider.as_str() {
        "postgres" => {
            let url = persistence
                .database_url
                .as_deref()
                .context("persistence.database_url is required for the postgres provider")?;
            info!(name: "persistence.connect", provider = "postgres", "Connecting to Postgres");
            let backend =
                PostgresBackend::new(url, persistence.max_connections, memory.dedup_threshold).await?;
            Ok(Arc::new(backend))
        }
        "memory" => {
            info!(name: "persistence.connect", provider = "memory", "Using in-memory storage");
            Ok(Arc::new(InMemoryBackend::new(memory.dedup_threshold)))
        }
        other => anyhow::bail!("Unknown persistence provider: {other}"),
    }
}

/// Build the embedder named by `embedding.provider`, wrapped in a cache when
/// `embedding.cache_entries > 0`.
///
/// - `hash` (default): [`HashEmbedder`] with `embedding.dimensions`, 384 when unset
/// - `fastembed`: local [`FastEmbedder`]
/// - `openai`: [`OpenAiEmbedder`], requires `embedding.base_url`; `embedding.dimensions`
///   overrides the length inferred from the model name
pub fn build_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    let embedder: Arc<dyn Embedder> = match config.provider.as_str() {
        "hash" => Arc::new(HashEmbedder::new(
            config.dimensions.unwrap_or(HashEmbedder::DEFAULT_DIMENSIONS),
        )),
        "fastembed" => Arc::new(FastEmbedder::new()),
        "openai" => {
            let base_url = config
                .base_url
                .clone()
                .context("embedding.base_url is required for the openai provider")?;
            Arc::new(OpenAiEmbedder::new(
                base_url,
                config.api_key.clone(),
                config.model.clone(),
                config.dimensions,
            ))
        }
        other => anyhow::bail!("Unknown embedding provider: {other}"),
    };

    info!(
        name: "embedding.provider.selected",
        provider = %config.provider,
        dimensions = embedder.dimensions(),
        "Embedding provider selected"
    );

    if config.cache_entries > 0 {
        Ok(Arc::new(CachedEmbedder::new(embedder, config.cache_entries)))
    } else {
        Ok(embedder)
    }
}
