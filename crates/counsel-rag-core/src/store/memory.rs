//! In-memory [`VectorIndex`] implementation for tests and ephemeral runs.
//!
//! Uses a `Vec` behind `std::sync::RwLock`. Queries are brute-force cosine
//! distance over all stored vectors.

use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;

use crate::embedding::cosine_distance;
use crate::error::Result;
use crate::models::{DocumentChunk, Neighbor};

use super::{check_batch, sort_neighbors, VectorIndex};

struct StoredVector {
    chunk: DocumentChunk,
    vector: Vec<f32>,
}

#[derive(Default)]
pub struct InMemoryIndex {
    vectors: RwLock<Vec<StoredVector>>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    async fn upsert_many(
        &self,
        chunks: &[DocumentChunk],
        embeddings: &[Vec<f32>],
    ) -> Result<usize> {
        check_batch(chunks, embeddings)?;
        let mut stored = self.vectors.write().unwrap_or_else(PoisonError::into_inner);
        for (chunk, vector) in chunks.iter().zip(embeddings.iter()) {
            let entry = StoredVector {
                chunk: chunk.clone(),
                vector: vector.clone(),
            };
            match stored.iter_mut().find(|sv| sv.chunk.id == chunk.id) {
                Some(existing) => *existing = entry,
                None => stored.push(entry),
            }
        }
        Ok(chunks.len())
    }

    async fn query(&self, embedding: &[f32], n: usize) -> Result<Vec<Neighbor>> {
        let stored = self.vectors.read().unwrap_or_else(PoisonError::into_inner);
        let mut neighbors: Vec<Neighbor> = stored
            .iter()
            .map(|sv| Neighbor {
                id: sv.chunk.id.clone(),
                text: sv.chunk.text.clone(),
                metadata: sv.chunk.metadata.clone(),
                distance: cosine_distance(embedding, &sv.vector),
            })
            .collect();
        sort_neighbors(&mut neighbors);
        neighbors.truncate(n);
        Ok(neighbors)
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.vectors.read().unwrap_or_else(PoisonError::into_inner).len())
    }

    async fn reset(&self) -> Result<()> {
        self.vectors.write().unwrap_or_else(PoisonError::into_inner).clear();
        Ok(())
    }
}
