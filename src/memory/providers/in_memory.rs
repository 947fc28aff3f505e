use crate::memory::backend::{ContentQuery, StorageBackend};
use crate::memory::embedding::cosine_similarity;
use crate::memory::types::{Memory, SimilarityMatch};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

/// Process-local [`StorageBackend`].
///
/// Ranking runs as a linear scan over the table, which is fine for tests and
/// single-process agents with modest histories.
#[derive(Debug)]
pub struct InMemoryBackend {
    tables: RwLock<HashMap<String, Vec<Memory>>>,
    dedup_threshold: f32,
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DEDUP_THRESHOLD)
    }
}

impl InMemoryBackend {
    pub const DEFAULT_DEDUP_THRESHOLD: f32 = 0.95;

    pub fn new(dedup_threshold: f32) -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
            dedup_threshold,
        }
    }

    fn is_near_duplicate(&self, rows: &[Memory], candidate: &Memory) -> bool {
        let Some(embedding) = candidate.embedding.as_deref() else {
            return false;
        };

        rows.iter()
            .filter(|m| m.user_id == candidate.user_id && m.id != candidate.id)
            .filter_map(|m| m.embedding.as_deref())
            .any(|other| cosine_similarity(embedding, other) >= self.dedup_threshold)
    }
}

/// Reads `record[field][sub_field]` as text. Only the `content` field holds text.
fn addressed_text<'m>(memory: &'m Memory, field: &str, sub_field: &str) -> Option<&'m str> {
    if field != "content" {
        return None;
    }
    let content = &memory.content;
    match sub_field {
        "content" => Some(content.text.as_str()),
        "action" => content.action.as_deref(),
        other => content.extra.get(other)?.as_str(),
    }
}

/// Character-level edit distance.
pub(crate) fn levenshtein(a: &str, b: &str) -> usize {
    let b_chars: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b_chars.len()).collect();
    let mut curr = vec![0; b_chars.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b_chars.iter().enumerate() {
            let cost = usize::from(ca != *cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b_chars.len()]
}

#[async_trait]
impl StorageBackend for InMemoryBackend {
    async fn get_memories_by_user_ids(
        &self,
        table: &str,
        user_ids: &[Uuid],
        count: usize,
        unique: bool,
    ) -> Result<Vec<Memory>> {
        let tables = self.tables.read().await;
        let Some(rows) = tables.get(table) else {
            return Ok(vec![]);
        };

        let mut memories: Vec<Memory> = rows
            .iter()
            .filter(|m| user_ids.contains(&m.user_id))
            .filter(|m| !unique || m.unique)
            .cloned()
            .collect();

        memories.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        memories.truncate(count);
        Ok(memories)
    }

    async fn get_memory_by_content(&self, query: ContentQuery<'_>) -> Result<Vec<SimilarityMatch>> {
        let tables = self.tables.read().await;
        let Some(rows) = tables.get(query.table) else {
            return Ok(vec![]);
        };

        let input = query.input.to_lowercase();
        let mut matches: Vec<SimilarityMatch> = rows
            .iter()
            .filter_map(|m| {
                let text = addressed_text(m, query.field, query.sub_field)?;
                let distance = levenshtein(&input, &text.to_lowercase()) as f32;
                (distance <= query.threshold).then(|| SimilarityMatch {
                    memory: m.clone(),
                    similarity: distance,
                    threshold: query.threshold,
                })
            })
            .collect();

        matches.sort_by(|a, b| {
            a.similarity
                .partial_cmp(&b.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        matches.truncate(query.count);
        Ok(matches)
    }

    async fn search_memories(
        &self,
        table: &str,
        user_ids: &[Uuid],
        embedding: &[f32],
        match_threshold: f32,
        match_count: usize,
        unique: bool,
    ) -> Result<Vec<Memory>> {
        let tables = self.tables.read().await;
        let Some(rows) = tables.get(table) else {
            return Ok(vec![]);
        };

        let mut scored: Vec<(f32, &Memory)> = rows
            .iter()
            .filter(|m| user_ids.is_empty() || user_ids.contains(&m.user_id))
            .filter(|m| !unique || m.unique)
            .filter_map(|m| {
                let score = cosine_similarity(embedding, m.embedding.as_deref()?);
                (score >= match_threshold).then_some((score, m))
            })
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        Ok(scored
            .into_iter()
            .take(match_count)
            .map(|(_, m)| m.clone())
            .collect())
    }

    async fn create_memory(&self, table: &str, memory: &Memory, unique: bool) -> Result<()> {
        let mut tables = self.tables.write().await;
        let rows = tables.entry(table.to_string()).or_default();

        let mut record = memory.clone();
        record.unique = unique && !self.is_near_duplicate(rows, &record);
        debug!(
            name: "memory.backend.insert",
            table,
            memory_id = %record.id,
            unique = record.unique,
            "Inserting memory"
        );

        if let Some(existing) = rows.iter_mut().find(|m| m.id == record.id) {
            *existing = record;
        } else {
            rows.push(record);
        }
        Ok(())
    }

    async fn remove_memory(&self, table: &str, id: Uuid) -> Result<()> {
        let mut tables = self.tables.write().await;
        if let Some(rows) = tables.get_mut(table) {
            rows.retain(|m| m.id != id);
        }
        Ok(())
    }

    async fn remove_all_memories_by_user_ids(&self, table: &str, user_ids: &[Uuid]) -> Result<()> {
        let mut tables = self.tables.write().await;
        if let Some(rows) = tables.get_mut(table) {
            rows.retain(|m| !user_ids.contains(&m.user_id));
        }
        Ok(())
    }

    async fn count_memories_by_user_ids(
        &self,
        table: &str,
        user_ids: &[Uuid],
        unique: bool,
    ) -> Result<usize> {
        let tables = self.tables.read().await;
        Ok(tables.get(table).map_or(0, |rows| {
            rows.iter()
                .filter(|m| user_ids.contains(&m.user_id))
                .filter(|m| !unique || m.unique)
                .count()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::types::Content;

    fn memory(user: Uuid, text: &str, embedding: Vec<f32>) -> Memory {
        Memory::new(user, text).with_embedding(embedding)
    }

    #[test]
    fn test_levenshtein() {
        assert_eq!(levenshtein("", ""), 0);
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("abc", ""), 3);
        assert_eq!(levenshtein("héllo", "hello"), 1);
    }

    #[tokio::test]
    async fn test_unique_insert_flags_near_duplicates() {
        let backend = InMemoryBackend::default();
        let user = Uuid::new_v4();

        backend
            .create_memory("messages", &memory(user, "a", vec![1.0, 0.0]), true)
            .await
            .unwrap();
        backend
            .create_memory("messages", &memory(user, "a again", vec![0.99, 0.01]), true)
            .await
            .unwrap();
        backend
            .create_memory("messages", &memory(user, "b", vec![0.0, 1.0]), true)
            .await
            .unwrap();

        assert_eq!(backend.count_memories_by_user_ids("messages", &[user], false).await.unwrap(), 3);
        assert_eq!(backend.count_memories_by_user_ids("messages", &[user], true).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_dedup_is_scoped_to_user_and_table() {
        let backend = InMemoryBackend::default();
        let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());

        backend
            .create_memory("messages", &memory(alice, "x", vec![1.0, 0.0]), true)
            .await
            .unwrap();
        backend
            .create_memory("messages", &memory(bob, "x", vec![1.0, 0.0]), true)
            .await
            .unwrap();
        backend
            .create_memory("facts", &memory(alice, "x", vec![1.0, 0.0]), true)
            .await
            .unwrap();

        assert_eq!(backend.count_memories_by_user_ids("messages", &[alice, bob], true).await.unwrap(), 2);
        assert_eq!(backend.count_memories_by_user_ids("facts", &[alice], true).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_non_unique_insert_is_never_flagged_unique() {
        let backend = InMemoryBackend::default();
        let user = Uuid::new_v4();
        backend
            .create_memory("messages", &memory(user, "x", vec![1.0, 0.0]), false)
            .await
            .unwrap();

        let all = backend.get_memories_by_user_ids("messages", &[user], 10, false).await.unwrap();
        assert_eq!(all.len(), 1);
        assert!(!all[0].unique);
        assert!(backend.get_memories_by_user_ids("messages", &[user], 10, true).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_content_query_ranks_by_edit_distance() {
        let backend = InMemoryBackend::default();
        let user = Uuid::new_v4();
        for text in ["hello world", "hello world!", "hullo world!", "goodbye"] {
            backend
                .create_memory("messages", &memory(user, text, vec![1.0]), false)
                .await
                .unwrap();
        }

        let matches = backend
            .get_memory_by_content(ContentQuery {
                table: "messages",
                threshold: 2.0,
                input: "Hello World",
                field: "content",
                sub_field: "content",
                count: 10,
            })
            .await
            .unwrap();

        let texts: Vec<_> = matches.iter().map(|m| m.memory.content.text.as_str()).collect();
        assert_eq!(texts, vec!["hello world", "hello world!", "hullo world!"]);
        assert_eq!(matches[0].similarity, 0.0);
        assert!(matches.iter().all(|m| m.threshold == 2.0));
    }

    #[tokio::test]
    async fn test_content_query_reads_extra_fields() {
        let backend = InMemoryBackend::default();
        let user = Uuid::new_v4();
        let mut content = Content::text("unrelated");
        content
            .extra
            .insert("summary".to_string(), serde_json::json!("Moved to Lisbon"));
        content.extra.insert("rating".to_string(), serde_json::json!(5));
        backend
            .create_memory("messages", &Memory::new(user, content), false)
            .await
            .unwrap();

        let query = |field, sub_field| ContentQuery {
            table: "messages",
            threshold: 1.0,
            input: "moved to lisbon",
            field,
            sub_field,
            count: 10,
        };

        let matches = backend.get_memory_by_content(query("content", "summary")).await.unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].similarity, 0.0);

        // Non-string values and other top-level fields never match.
        assert!(backend.get_memory_by_content(query("content", "rating")).await.unwrap().is_empty());
        assert!(backend.get_memory_by_content(query("user_id", "summary")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_same_id_in_two_tables_is_kept_apart() {
        let backend = InMemoryBackend::default();
        let user = Uuid::new_v4();
        let shared = memory(user, "in messages", vec![1.0]);
        let mut copy = shared.clone();
        copy.content = Content::text("in facts");

        backend.create_memory("messages", &shared, false).await.unwrap();
        backend.create_memory("facts", &copy, false).await.unwrap();

        let messages = backend.get_memories_by_user_ids("messages", &[user], 10, false).await.unwrap();
        let facts = backend.get_memories_by_user_ids("facts", &[user], 10, false).await.unwrap();
        assert_eq!(messages[0].content.text, "in messages");
        assert_eq!(facts[0].content.text, "in facts");

        backend.remove_memory("facts", shared.id).await.unwrap();
        assert_eq!(backend.count_memories_by_user_ids("messages", &[user], false).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_vector_search_threshold_and_order() {
        let backend = InMemoryBackend::default();
        let user = Uuid::new_v4();
        backend
            .create_memory("messages", &memory(user, "near", vec![1.0, 0.1]), false)
            .await
            .unwrap();
        backend
            .create_memory("messages", &memory(user, "exact", vec![1.0, 0.0]), false)
            .await
            .unwrap();
        backend
            .create_memory("messages", &memory(user, "far", vec![0.0, 1.0]), false)
            .await
            .unwrap();

        let results = backend
            .search_memories("messages", &[], &[1.0, 0.0], 0.5, 10, false)
            .await
            .unwrap();
        let texts: Vec<_> = results.iter().map(|m| m.content.text.as_str()).collect();
        assert_eq!(texts, vec!["exact", "near"]);
    }

    #[tokio::test]
    async fn test_remove_operations() {
        let backend = InMemoryBackend::default();
        let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());
        let first = memory(alice, "one", vec![1.0]);
        let first_id = first.id;

        backend.create_memory("messages", &first, false).await.unwrap();
        backend.create_memory("messages", &memory(alice, "two", vec![1.0]), false).await.unwrap();
        backend.create_memory("messages", &memory(bob, "three", vec![1.0]), false).await.unwrap();

        backend.remove_memory("messages", first_id).await.unwrap();
        assert_eq!(backend.count_memories_by_user_ids("messages", &[alice], false).await.unwrap(), 1);

        backend.remove_all_memories_by_user_ids("messages", &[alice]).await.unwrap();
        assert_eq!(backend.count_memories_by_user_ids("messages", &[alice], false).await.unwrap(), 0);
        assert_eq!(backend.count_memories_by_user_ids("messages", &[bob], false).await.unwrap(), 1);
    }
}
