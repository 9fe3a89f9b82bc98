//! Persisted tool embeddings.
//!
//! Rows are keyed by `(tool_uuid, namespace_uuid, model_name)` and
//! carry the exact text that produced the stored vector; a text
//! mismatch against the current canonical text marks the row stale.
//! The Postgres implementation relies on the pgvector extension for the
//! cosine-distance ordering.

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::ProxyResult;

/// One durable embedding row.
#[derive(Debug, Clone)]
pub struct EmbeddingRow {
    pub tool_uuid: Uuid,
    pub namespace_uuid: Uuid,
    pub model_name: String,
    pub embedding_dimensions: i32,
    pub embedding: Vec<f32>,
    pub embedding_text: String,
}

/// A tool's current canonical text, used for the staleness check.
#[derive(Debug, Clone)]
pub struct RequestedEmbedding {
    pub tool_uuid: Uuid,
    pub embedding_text: String,
}

/// One similarity-search hit.
#[derive(Debug, Clone)]
pub struct SimilarTool {
    pub tool_uuid: Uuid,
    pub embedding_text: String,
    pub similarity: f32,
}

/// Durable embedding storage scoped by namespace and model.
#[async_trait]
pub trait EmbeddingStore: Send + Sync {
    /// Insert rows, replacing any existing row for the same
    /// `(tool_uuid, namespace_uuid, model_name)` tuple.
    async fn upsert(&self, rows: &[EmbeddingRow]) -> ProxyResult<()>;

    /// Top `limit` rows by ascending cosine distance to `query`,
    /// reported as `similarity = 1 - distance`. Tie order is
    /// store-defined.
    async fn find_similar(
        &self,
        namespace_uuid: Uuid,
        model_name: &str,
        query: &[f32],
        limit: usize,
    ) -> ProxyResult<Vec<SimilarTool>>;

    /// Every requested tool with no stored row or a stored
    /// `embedding_text` that differs byte-for-byte.
    async fn tools_needing_embeddings(
        &self,
        requested: &[RequestedEmbedding],
        namespace_uuid: Uuid,
        model_name: &str,
    ) -> ProxyResult<Vec<Uuid>>;

    async fn delete_by_tool_uuids(&self, tool_uuids: &[Uuid]) -> ProxyResult<u64>;

    async fn delete_by_namespace(
        &self,
        namespace_uuid: Uuid,
        model_name: Option<&str>,
    ) -> ProxyResult<u64>;

    async fn delete_by_tool_and_namespace(
        &self,
        tool_uuid: Uuid,
        namespace_uuid: Uuid,
    ) -> ProxyResult<u64>;

    async fn count_by_namespace(&self, namespace_uuid: Uuid) -> ProxyResult<i64>;

    async fn has_embeddings(&self, namespace_uuid: Uuid) -> ProxyResult<bool>;
}

/// pgvector-backed store.
pub struct PgEmbeddingRepository {
    pool: PgPool,
}

impl PgEmbeddingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EmbeddingStore for PgEmbeddingRepository {
    async fn upsert(&self, rows: &[EmbeddingRow]) -> ProxyResult<()> {
        for row in rows {
            sqlx::query(
                r#"
                INSERT INTO tool_embeddings
                    (uuid, tool_uuid, namespace_uuid, model_name,
                     embedding_dimensions, embedding, embedding_text)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                ON CONFLICT (tool_uuid, namespace_uuid, model_name) DO UPDATE SET
                    embedding = EXCLUDED.embedding,
                    embedding_text = EXCLUDED.embedding_text,
                    embedding_dimensions = EXCLUDED.embedding_dimensions,
                    updated_at = now()
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(row.tool_uuid)
            .bind(row.namespace_uuid)
            .bind(&row.model_name)
            .bind(row.embedding_dimensions)
            .bind(pgvector::Vector::from(row.embedding.clone()))
            .bind(&row.embedding_text)
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    async fn find_similar(
        &self,
        namespace_uuid: Uuid,
        model_name: &str,
        query: &[f32],
        limit: usize,
    ) -> ProxyResult<Vec<SimilarTool>> {
        let rows: Vec<(Uuid, String, f64)> = sqlx::query_as(
            r#"
            SELECT tool_uuid, embedding_text, 1 - (embedding <=> $3) AS similarity
            FROM tool_embeddings
            WHERE namespace_uuid = $1 AND model_name = $2
            ORDER BY embedding <=> $3
            LIMIT $4
            "#,
        )
        .bind(namespace_uuid)
        .bind(model_name)
        .bind(pgvector::Vector::from(query.to_vec()))
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(tool_uuid, embedding_text, similarity)| SimilarTool {
                tool_uuid,
                embedding_text,
                similarity: similarity as f32,
            })
            .collect())
    }

    async fn tools_needing_embeddings(
        &self,
        requested: &[RequestedEmbedding],
        namespace_uuid: Uuid,
        model_name: &str,
    ) -> ProxyResult<Vec<Uuid>> {
        if requested.is_empty() {
            return Ok(Vec::new());
        }

        let tool_uuids: Vec<Uuid> = requested.iter().map(|r| r.tool_uuid).collect();
        let stored: Vec<(Uuid, String)> = sqlx::query_as(
            r#"
            SELECT tool_uuid, embedding_text
            FROM tool_embeddings
            WHERE namespace_uuid = $1 AND model_name = $2 AND tool_uuid = ANY($3)
            "#,
        )
        .bind(namespace_uuid)
        .bind(model_name)
        .bind(&tool_uuids)
        .fetch_all(&self.pool)
        .await?;

        Ok(stale_or_missing(requested, stored.into_iter().collect()))
    }

    async fn delete_by_tool_uuids(&self, tool_uuids: &[Uuid]) -> ProxyResult<u64> {
        if tool_uuids.is_empty() {
            return Ok(0);
        }
        let result = sqlx::query("DELETE FROM tool_embeddings WHERE tool_uuid = ANY($1)")
            .bind(tool_uuids)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_by_namespace(
        &self,
        namespace_uuid: Uuid,
        model_name: Option<&str>,
    ) -> ProxyResult<u64> {
        let result = match model_name {
            Some(model) => {
                sqlx::query(
                    "DELETE FROM tool_embeddings WHERE namespace_uuid = $1 AND model_name = $2",
                )
                .bind(namespace_uuid)
                .bind(model)
                .execute(&self.pool)
                .await?
            }
            None => {
                sqlx::query("DELETE FROM tool_embeddings WHERE namespace_uuid = $1")
                    .bind(namespace_uuid)
                    .execute(&self.pool)
                    .await?
            }
        };
        Ok(result.rows_affected())
    }

    async fn delete_by_tool_and_namespace(
        &self,
        tool_uuid: Uuid,
        namespace_uuid: Uuid,
    ) -> ProxyResult<u64> {
        let result = sqlx::query(
            "DELETE FROM tool_embeddings WHERE tool_uuid = $1 AND namespace_uuid = $2",
        )
        .bind(tool_uuid)
        .bind(namespace_uuid)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn count_by_namespace(&self, namespace_uuid: Uuid) -> ProxyResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM tool_embeddings WHERE namespace_uuid = $1")
                .bind(namespace_uuid)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    async fn has_embeddings(&self, namespace_uuid: Uuid) -> ProxyResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM tool_embeddings WHERE namespace_uuid = $1)",
        )
        .bind(namespace_uuid)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }
}

/// Requested tools whose stored text is absent or differs.
fn stale_or_missing(
    requested: &[RequestedEmbedding],
    stored: HashMap<Uuid, String>,
) -> Vec<Uuid> {
    requested
        .iter()
        .filter(|r| stored.get(&r.tool_uuid) != Some(&r.embedding_text))
        .map(|r| r.tool_uuid)
        .collect()
}
