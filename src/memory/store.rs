use super::MemoryError;
use super::backend::{ContentQuery, StorageBackend};
use super::embedding::Embedder;
use super::types::{Memory, SimilarityMatch};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// Options for [`MemoryStore::get_memories_by_user_ids`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryQuery {
    pub count: usize,
    pub unique: bool,
}

impl Default for MemoryQuery {
    fn default() -> Self {
        Self {
            count: 10,
            unique: true,
        }
    }
}

/// Options for [`MemoryStore::search_memories_by_embedding`].
#[derive(Debug, Clone, PartialEq)]
pub struct SearchOptions {
    pub match_threshold: f32,
    pub count: usize,
    /// Empty searches every user.
    pub user_ids: Vec<Uuid>,
    pub unique: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            match_threshold: 0.1,
            count: 10,
            user_ids: Vec::new(),
            unique: false,
        }
    }
}

/// Memory lifecycle over one table of a [`StorageBackend`].
///
/// Attaches embeddings before persistence and forwards every query to the
/// backend with the bound table name. Ranking, thresholds and dedup are the
/// backend's job; the store only validates what it can check locally (empty
/// text, vector length).
#[derive(Clone)]
pub struct MemoryStore {
    backend: Arc<dyn StorageBackend>,
    embedder: Arc<dyn Embedder>,
    table: String,
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("table", &self.table)
            .field("backend", &self.backend)
            .field("dimensions", &self.embedder.dimensions())
            .finish()
    }
}

impl MemoryStore {
    /// Threshold for [`get_memory_by_content`](Self::get_memory_by_content), in edits.
    pub const CONTENT_MATCH_THRESHOLD: f32 = 2.0;
    pub const CONTENT_MATCH_COUNT: usize = 10;

    pub fn new(
        backend: Arc<dyn StorageBackend>,
        embedder: Arc<dyn Embedder>,
        table: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            embedder,
            table: table.into(),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Embedding length D every persisted memory carries.
    pub fn dimensions(&self) -> usize {
        self.embedder.dimensions()
    }

    fn check_dimensions(&self, actual: usize) -> Result<(), MemoryError> {
        let expected = self.dimensions();
        if actual == expected {
            Ok(())
        } else {
            Err(MemoryError::DimensionMismatch { expected, actual })
        }
    }

    /// Embed free text with the store's embedder, e.g. to build a search query.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, MemoryError> {
        let embedding = self
            .embedder
            .embed(text)
            .await
            .map_err(MemoryError::Embedding)?;
        self.check_dimensions(embedding.len())?;
        Ok(embedding)
    }

    /// Ensure `memory` carries an embedding of its text.
    ///
    /// Returns the memory unchanged when an embedding is already present.
    pub async fn add_embedding_to_memory(&self, mut memory: Memory) -> Result<Memory, MemoryError> {
        if memory.has_embedding() {
            return Ok(memory);
        }

        if !memory.content.has_text() {
            return Err(MemoryError::EmptyContent(memory.id));
        }

        let embedding = self.embed(&memory.content.text).await?;

        debug!(
            name: "memory.embedding.attached",
            memory_id = %memory.id,
            dimensions = embedding.len(),
            "Attached embedding to memory"
        );
        memory.embedding = Some(embedding);
        Ok(memory)
    }

    pub async fn get_memories_by_user_ids(
        &self,
        user_ids: &[Uuid],
        query: MemoryQuery,
    ) -> Result<Vec<Memory>, MemoryError> {
        self.backend
            .get_memories_by_user_ids(&self.table, user_ids, query.count, query.unique)
            .await
            .map_err(MemoryError::Backend)
    }

    /// Memories whose text is within a couple of edits of `text`.
    pub async fn get_memory_by_content(&self, text: &str) -> Result<Vec<SimilarityMatch>, MemoryError> {
        self.backend
            .get_memory_by_content(ContentQuery {
                table: &self.table,
                threshold: Self::CONTENT_MATCH_THRESHOLD,
                input: text,
                field: "content",
                sub_field: "content",
                count: Self::CONTENT_MATCH_COUNT,
            })
            .await
            .map_err(MemoryError::Backend)
    }

    pub async fn search_memories_by_embedding(
        &self,
        embedding: &[f32],
        options: SearchOptions,
    ) -> Result<Vec<Memory>, MemoryError> {
        self.check_dimensions(embedding.len())?;

        self.backend
            .search_memories(
                &self.table,
                &options.user_ids,
                embedding,
                options.match_threshold,
                options.count,
                options.unique,
            )
            .await
            .map_err(MemoryError::Backend)
    }

    /// Persist a memory. With `unique`, the backend flags near-duplicates.
    ///
    /// Memories without an embedding are stored as-is; they never match a
    /// vector search or a dedup check.
    pub async fn create_memory(&self, memory: &Memory, unique: bool) -> Result<(), MemoryError> {
        if let Some(embedding) = memory.embedding.as_deref() {
            self.check_dimensions(embedding.len())?;
        }

        self.backend
            .create_memory(&self.table, memory, unique)
            .await
            .map_err(MemoryError::Backend)?;

        info!(
            name: "memory.created",
            table = %self.table,
            memory_id = %memory.id,
            user_id = %memory.user_id,
            unique,
            "Memory created"
        );
        Ok(())
    }

    pub async fn remove_memory(&self, id: Uuid) -> Result<(), MemoryError> {
        self.backend
            .remove_memory(&self.table, id)
            .await
            .map_err(MemoryError::Backend)?;
        debug!(name: "memory.removed", table = %self.table, memory_id = %id, "Memory removed");
        Ok(())
    }

    pub async fn remove_all_memories_by_user_ids(&self, user_ids: &[Uuid]) -> Result<(), MemoryError> {
        self.backend
            .remove_all_memories_by_user_ids(&self.table, user_ids)
            .await
            .map_err(MemoryError::Backend)?;
        info!(
            name: "memory.removed_all",
            table = %self.table,
            users = user_ids.len(),
            "Memories removed"
        );
        Ok(())
    }

    pub async fn count_memories_by_user_ids(
        &self,
        user_ids: &[Uuid],
        unique: bool,
    ) -> Result<usize, MemoryError> {
        self.backend
            .count_memories_by_user_ids(&self.table, user_ids, unique)
            .await
            .map_err(MemoryError::Backend)
    }
}
