//! Storage contract the memory layer requires of a vector store.

use super::types::{Memory, SimilarityMatch};
use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

/// Parameters of a content-similarity query.
///
/// `field`/`sub_field` address the text inside the stored record, e.g.
/// `content.content` for the memory's text.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContentQuery<'a> {
    pub table: &'a str,
    pub threshold: f32,
    pub input: &'a str,
    pub field: &'a str,
    pub sub_field: &'a str,
    pub count: usize,
}

/// Durable store of memories, partitioned by table.
///
/// # Dedup contract
///
/// `create_memory(.., unique = true)` always inserts the record. Its `unique`
/// flag is set to `true` only when no record of the same user in the same
/// table has a cosine similarity at or above the backend's dedup threshold.
/// With `unique = false` the record is stored non-unique. Queries issued
/// with `unique = true` see unique-flagged records only.
///
/// The check and the insert must be atomic with respect to other inserts
/// into the same table.
#[async_trait]
pub trait StorageBackend: Send + Sync + std::fmt::Debug {
    /// Newest-first memories of the given users.
    async fn get_memories_by_user_ids(
        &self,
        table: &str,
        user_ids: &[Uuid],
        count: usize,
        unique: bool,
    ) -> Result<Vec<Memory>>;

    /// Records whose addressed text lies within `threshold` edit distance of
    /// the input, closest first.
    async fn get_memory_by_content(&self, query: ContentQuery<'_>) -> Result<Vec<SimilarityMatch>>;

    /// Records with cosine similarity at or above `match_threshold`, most
    /// similar first. An empty `user_ids` searches every user.
    async fn search_memories(
        &self,
        table: &str,
        user_ids: &[Uuid],
        embedding: &[f32],
        match_threshold: f32,
        match_count: usize,
        unique: bool,
    ) -> Result<Vec<Memory>>;

    async fn create_memory(&self, table: &str, memory: &Memory, unique: bool) -> Result<()>;

    async fn remove_memory(&self, table: &str, id: Uuid) -> Result<()>;

    async fn remove_all_memories_by_user_ids(&self, table: &str, user_ids: &[Uuid]) -> Result<()>;

    async fn count_memories_by_user_ids(
        &self,
        table: &str,
        user_ids: &[Uuid],
        unique: bool,
    ) -> Result<usize>;
}
