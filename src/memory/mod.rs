//! Memory storage and retrieval.
//!
//! A [`MemoryStore`] owns the lifecycle of embedding-tagged text records in
//! one table of a [`StorageBackend`]: it attaches embeddings through an
//! [`Embedder`], persists with optional dedup, and forwards id, content and
//! vector queries to the backend.
//!
//! # Example
//!
//! ```rust
//! use agent_recall::memory::{HashEmbedder, InMemoryBackend, Memory, MemoryQuery, MemoryStore};
//! use std::sync::Arc;
//! use uuid::Uuid;
//!
//! # tokio_test_block_on(async {
//! let store = MemoryStore::new(
//!     Arc::new(InMemoryBackend::default()),
//!     Arc::new(HashEmbedder::new(64)),
//!     "messages",
//! );
//!
//! let user = Uuid::new_v4();
//! let memory = store.add_embedding_to_memory(Memory::new(user, "I like tea")).await?;
//! store.create_memory(&memory, true).await?;
//!
//! let recent = store.get_memories_by_user_ids(&[user], MemoryQuery::default()).await?;
//! assert_eq!(recent.len(), 1);
//! # Ok::<(), agent_recall::memory::MemoryError>(())
//! # }).unwrap();
//! # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Runtime::new().unwrap().block_on(f)
//! # }
//! ```

pub mod backend;
pub mod embedding;
pub mod providers;
pub mod store;
pub mod types;

pub use backend::{ContentQuery, StorageBackend};
pub use embedding::{
    CachedEmbedder, Embedder, FastEmbedder, HashEmbedder, OpenAiEmbedder, cosine_similarity,
};
pub use providers::{InMemoryBackend, PostgresBackend};
pub use store::{MemoryQuery, MemoryStore, SearchOptions};
pub use types::{Content, Memory, SimilarityMatch};

use uuid::Uuid;

/// Errors surfaced by [`MemoryStore`].
#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    /// The memory has no text to embed.
    #[error("Cannot embed memory {0}: content text is empty")]
    EmptyContent(Uuid),

    /// A vector's length differs from the store's embedding dimension.
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Passthrough of a storage backend failure.
    #[error("Storage backend error: {0}")]
    Backend(#[source] anyhow::Error),

    /// Passthrough of an embedder failure.
    #[error("Embedding error: {0}")]
    Embedding(#[source] anyhow::Error),
}
