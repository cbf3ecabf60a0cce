//! SQLite-backed [`VectorIndex`] implementation.
//!
//! Every collection lives in one database file under the configured
//! persist directory, so the index survives restarts. Vectors are stored as
//! little-endian `f32` BLOBs and queried by brute-force cosine distance,
//! which is plenty for a corpus of a few hundred chunks.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use counsel_rag_core::embedding::{blob_to_vec, cosine_distance, vec_to_blob};
use counsel_rag_core::models::{ChunkKind, ChunkMetadata, DocumentChunk, Neighbor};
use counsel_rag_core::store::{check_batch, sort_neighbors, VectorIndex};
use counsel_rag_core::RagError;

use crate::config::VectorDbConfig;
use crate::{db, migrate};

const COLLECTION_DESCRIPTION: &str = "心理咨询知识库";

/// SQLite implementation of the [`VectorIndex`] trait, scoped to one
/// named collection.
pub struct SqliteIndex {
    pool: SqlitePool,
    collection: String,
}

impl SqliteIndex {
    /// Open the database and get-or-create the configured collection.
    ///
    /// The returned flag is `true` when the collection did not exist before
    /// this call; the caller must then run a full ingestion pass.
    pub async fn open(config: &VectorDbConfig) -> Result<(Self, bool)> {
        let pool = db::connect(&config.db_path()).await?;
        migrate::run_migrations(&pool).await?;

        let inserted = sqlx::query(
            "INSERT OR IGNORE INTO collections (name, description, created_at) VALUES (?, ?, ?)",
        )
        .bind(&config.collection)
        .bind(COLLECTION_DESCRIPTION)
        .bind(chrono::Utc::now().timestamp())
        .execute(&pool)
        .await?
        .rows_affected();

        let index = Self {
            pool,
            collection: config.collection.clone(),
        };
        Ok((index, inserted == 1))
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn row_to_neighbor(row: &sqlx::sqlite::SqliteRow, query: &[f32]) -> Result<Neighbor, sqlx::Error> {
    let kind: String = row.try_get("kind")?;
    let blob: Vec<u8> = row.try_get("embedding")?;
    Ok(Neighbor {
        id: row.try_get("id")?,
        text: row.try_get("text")?,
        metadata: ChunkMetadata {
            topic: row.try_get("topic")?,
            kind: ChunkKind::parse(&kind).unwrap_or(ChunkKind::Content),
            keywords: row.try_get("keywords")?,
        },
        distance: cosine_distance(query, &blob_to_vec(&blob)),
    })
}

#[async_trait]
impl VectorIndex for SqliteIndex {
    async fn upsert_many(
        &self,
        chunks: &[DocumentChunk],
        embeddings: &[Vec<f32>],
    ) -> counsel_rag_core::Result<usize> {
        check_batch(chunks, embeddings)?;
        let ingestion = |e: sqlx::Error| RagError::Ingestion(e.to_string());

        let mut tx = self.pool.begin().await.map_err(ingestion)?;
        for (chunk, embedding) in chunks.iter().zip(embeddings.iter()) {
            sqlx::query(
                r#"
                INSERT INTO vectors (collection, id, topic, kind, keywords, text, embedding)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(collection, id) DO UPDATE SET
                    topic = excluded.topic,
                    kind = excluded.kind,
                    keywords = excluded.keywords,
                    text = excluded.text,
                    embedding = excluded.embedding
                "#,
            )
            .bind(&self.collection)
            .bind(&chunk.id)
            .bind(&chunk.metadata.topic)
            .bind(chunk.metadata.kind.as_str())
            .bind(&chunk.metadata.keywords)
            .bind(&chunk.text)
            .bind(vec_to_blob(embedding))
            .execute(&mut *tx)
            .await
            .map_err(ingestion)?;
        }
        tx.commit().await.map_err(ingestion)?;

        Ok(chunks.len())
    }

    async fn query(&self, embedding: &[f32], n: usize) -> counsel_rag_core::Result<Vec<Neighbor>> {
        let rows = sqlx::query(
            "SELECT id, topic, kind, keywords, text, embedding FROM vectors WHERE collection = ?",
        )
        .bind(&self.collection)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RagError::IndexQuery(e.to_string()))?;

        let mut neighbors = rows
            .iter()
            .map(|row| row_to_neighbor(row, embedding))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| RagError::IndexQuery(e.to_string()))?;

        sort_neighbors(&mut neighbors);
        neighbors.truncate(n);
        Ok(neighbors)
    }

    async fn count(&self) -> counsel_rag_core::Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM vectors WHERE collection = ?")
            .bind(&self.collection)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| RagError::IndexQuery(e.to_string()))?;
        Ok(count as usize)
    }

    async fn reset(&self) -> counsel_rag_core::Result<()> {
        sqlx::query("DELETE FROM vectors WHERE collection = ?")
            .bind(&self.collection)
            .execute(&self.pool)
            .await
            .map_err(|e| RagError::Ingestion(e.to_string()))?;
        Ok(())
    }
}
