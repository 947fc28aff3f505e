use crate::memory::backend::{ContentQuery, StorageBackend};
use crate::memory::types::{Content, Memory, SimilarityMatch};
use anyhow::{Result, bail};
use async_trait::async_trait;
use pgvector::Vector;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use uuid::Uuid;

/// Postgres + pgvector [`StorageBackend`].
///
/// Every table shares the `memories` relation, partitioned by its `type`
/// column. Content queries use `fuzzystrmatch`'s `levenshtein`.
#[derive(Debug)]
pub struct PostgresBackend {
    pool: PgPool,
    dedup_threshold: f32,
}

const MEMORY_COLUMNS: &str =
    "id, user_id, agent_id, room_id, content, embedding, \"unique\", created_at";

/// Upsert keyed on `(type, id)`, so one id may live in several tables.
const UPSERT_MEMORY: &str = r#"
    INSERT INTO memories (id, type, user_id, agent_id, room_id, content, embedding, "unique", created_at)
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
    ON CONFLICT (type, id) DO UPDATE SET
        content = EXCLUDED.content,
        embedding = EXCLUDED.embedding,
        "unique" = EXCLUDED."unique"
"#;

impl PostgresBackend {
    pub async fn new(connection_string: &str, max_connections: u32, dedup_threshold: f32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(connection_string)
            .await?;

        // Run Migrations
        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self {
            pool,
            dedup_threshold,
        })
    }

    fn memory_from_row(row: &PgRow) -> Result<Memory> {
        let content: serde_json::Value = row.try_get("content")?;
        let content: Content = serde_json::from_value(content)?;
        let embedding: Option<Vector> = row.try_get("embedding")?;

        Ok(Memory {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            agent_id: row.try_get("agent_id")?,
            room_id: row.try_get("room_id")?,
            content,
            embedding: embedding.map(|v| v.to_vec()),
            unique: row.try_get("unique")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

fn to_limit(count: usize) -> i64 {
    i64::try_from(count).unwrap_or(i64::MAX)
}

#[async_trait]
impl StorageBackend for PostgresBackend {
    async fn get_memories_by_user_ids(
        &self,
        table: &str,
        user_ids: &[Uuid],
        count: usize,
        unique: bool,
    ) -> Result<Vec<Memory>> {
        let sql = format!(
            r#"
            SELECT {MEMORY_COLUMNS}
            FROM memories
            WHERE type = $1
              AND user_id = ANY($2)
              AND ($3 = FALSE OR "unique" = TRUE)
            ORDER BY created_at DESC
            LIMIT $4
            "#
        );

        let rows = sqlx::query(&sql)
            .bind(table)
            .bind(user_ids)
            .bind(unique)
            .bind(to_limit(count))
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(Self::memory_from_row).collect()
    }

    async fn get_memory_by_content(&self, query: ContentQuery<'_>) -> Result<Vec<SimilarityMatch>> {
        // Column names cannot be bound; only the JSONB content column is addressable.
        if query.field != "content" {
            bail!("Unsupported content query field: {}", query.field);
        }

        // fuzzystrmatch rejects inputs longer than 255 characters.
        let sql = format!(
            r#"
            WITH scored AS (
                SELECT {MEMORY_COLUMNS},
                       levenshtein(left(lower($2), 255), left(lower(content->>$3), 255)) AS distance
                FROM memories
                WHERE type = $1
                  AND content->>$3 IS NOT NULL
            )
            SELECT * FROM scored
            WHERE distance <= $4
            ORDER BY distance ASC
            LIMIT $5
            "#
        );

        let rows = sqlx::query(&sql)
            .bind(query.table)
            .bind(query.input)
            .bind(query.sub_field)
            .bind(f64::from(query.threshold))
            .bind(to_limit(query.count))
            .fetch_all(&self.pool)
            .await?;

        let mut matches = Vec::with_capacity(rows.len());
        for row in &rows {
            let distance: i32 = row.try_get("distance")?;
            matches.push(SimilarityMatch {
                memory: Self::memory_from_row(row)?,
                similarity: distance as f32,
                threshold: query.threshold,
            });
        }
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
        let embedding_vector = Vector::from(embedding.to_vec());
        let sql = format!(
            r#"
            SELECT {MEMORY_COLUMNS}
            FROM memories
            WHERE type = $1
              AND (cardinality($2::uuid[]) = 0 OR user_id = ANY($2))
              AND ($5 = FALSE OR "unique" = TRUE)
              AND embedding IS NOT NULL
              AND 1 - (embedding <=> $3) >= $4
            ORDER BY embedding <=> $3
            LIMIT $6
            "#
        );

        let rows = sqlx::query(&sql)
            .bind(table)
            .bind(user_ids)
            .bind(embedding_vector)
            .bind(f64::from(match_threshold))
            .bind(unique)
            .bind(to_limit(match_count))
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(Self::memory_from_row).collect()
    }

    async fn create_memory(&self, table: &str, memory: &Memory, unique: bool) -> Result<()> {
        let content = serde_json::to_value(&memory.content)?;
        let embedding_vector = memory.embedding.clone().map(Vector::from);

        let mut tx = self.pool.begin().await?;

        // Serialize inserts per (table, user) so the dedup check sees prior inserts.
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1 || ':' || $2::text))")
            .bind(table)
            .bind(memory.user_id)
            .execute(&mut *tx)
            .await?;

        let is_unique = match (&embedding_vector, unique) {
            (Some(vector), true) => {
                let duplicate: Option<Uuid> = sqlx::query_scalar(
                    r#"
                    SELECT id FROM memories
                    WHERE type = $1
                      AND user_id = $2
                      AND id <> $3
                      AND embedding IS NOT NULL
                      AND 1 - (embedding <=> $4) >= $5
                    LIMIT 1
                    "#,
                )
                .bind(table)
                .bind(memory.user_id)
                .bind(memory.id)
                .bind(vector.clone())
                .bind(f64::from(self.dedup_threshold))
                .fetch_optional(&mut *tx)
                .await?;
                duplicate.is_none()
            }
            (None, true) => true,
            (_, false) => false,
        };

        sqlx::query(UPSERT_MEMORY)
            .bind(memory.id)
            .bind(table)
            .bind(memory.user_id)
            .bind(memory.agent_id)
            .bind(memory.room_id)
            .bind(content)
            .bind(embedding_vector)
            .bind(is_unique)
            .bind(memory.created_at)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn remove_memory(&self, table: &str, id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM memories WHERE type = $1 AND id = $2")
            .bind(table)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn remove_all_memories_by_user_ids(&self, table: &str, user_ids: &[Uuid]) -> Result<()> {
        sqlx::query("DELETE FROM memories WHERE type = $1 AND user_id = ANY($2)")
            .bind(table)
            .bind(user_ids)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn count_memories_by_user_ids(
        &self,
        table: &str,
        user_ids: &[Uuid],
        unique: bool,
    ) -> Result<usize> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM memories
            WHERE type = $1
              AND user_id = ANY($2)
              AND ($3 = FALSE OR "unique" = TRUE)
            "#,
        )
        .bind(table)
        .bind(user_ids)
        .bind(unique)
        .fetch_one(&self.pool)
        .await?;

        Ok(usize::try_from(count).unwrap_or(0))
    }
}
