//! Vector index abstraction.
//!
//! The [`VectorIndex`] trait is the storage seam for chunk embeddings,
//! enabling pluggable backends (SQLite in the app crate, in-memory here).
//! Implementations must be `Send + Sync` to be shared across request
//! handlers.
//!
//! # Operations
//!
//! | Method | Purpose |
//! |--------|---------|
//! | [`upsert_many`](VectorIndex::upsert_many) | Insert or replace chunks by id, in one batch |
//! | [`query`](VectorIndex::query) | Nearest neighbors by cosine distance, nearest first |
//! | [`count`](VectorIndex::count) | Number of stored chunks |
//! | [`reset`](VectorIndex::reset) | Drop every stored chunk |

pub mod memory;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{DocumentChunk, Neighbor};

#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Upsert `chunks` with their `embeddings` (same length, same order).
    ///
    /// Returns the number of chunks written. Failures are
    /// [`RagError::Ingestion`](crate::RagError::Ingestion).
    async fn upsert_many(&self, chunks: &[DocumentChunk], embeddings: &[Vec<f32>])
        -> Result<usize>;

    /// Up to `n` stored chunks ordered by ascending cosine distance to
    /// `embedding`. Ties are broken by chunk id. Failures are
    /// [`RagError::IndexQuery`](crate::RagError::IndexQuery).
    async fn query(&self, embedding: &[f32], n: usize) -> Result<Vec<Neighbor>>;

    async fn count(&self) -> Result<usize>;

    async fn reset(&self) -> Result<()>;
}

/// Check the upsert precondition shared by all backends.
pub fn check_batch(chunks: &[DocumentChunk], embeddings: &[Vec<f32>]) -> Result<()> {
    if chunks.len() != embeddings.len() {
        return Err(crate::RagError::Ingestion(format!(
            "mismatch: {} chunks but {} embeddings",
            chunks.len(),
            embeddings.len()
        )));
    }
    Ok(())
}

/// Order neighbors nearest first, then by id, using a total order on f32.
pub fn sort_neighbors(neighbors: &mut [Neighbor]) {
    neighbors.sort_by(|a, b| {
        a.distance
            .total_cmp(&b.distance)
            .then_with(|| a.id.cmp(&b.id))
    });
}
