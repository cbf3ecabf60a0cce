//! The embedding seam and the vector math shared by every index.
//!
//! Concrete providers (fastembed, Ollama, OpenAI) and the batching,
//! timeout-bounded front-end live in the `counsel-rag` app crate. This
//! module only knows how a vector is produced, stored, and compared.

use async_trait::async_trait;

use crate::error::Result;

/// A sentence-embedding backend.
///
/// `embed` is the single-text path used for queries; it must return the
/// same vector that `embed_batch(&[text])` would return at index 0.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Model identifier, reported in stats and logs.
    fn model_name(&self) -> &str;
    /// Length of every vector this provider returns.
    fn dims(&self) -> usize;
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
    /// Embed `texts`, one vector per text, in input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Pack a vector into the BLOB layout stored by the SQLite index:
/// `f32` values back to back, little-endian.
///
/// ```rust
/// use counsel_rag_core::embedding::{blob_to_vec, vec_to_blob};
///
/// let query = vec![0.25f32, -1.0];
/// assert_eq!(vec_to_blob(&query).len(), 8);
/// assert_eq!(blob_to_vec(&vec_to_blob(&query)), query);
/// ```
pub fn vec_to_blob(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|x| x.to_le_bytes()).collect()
}

/// Unpack a BLOB written by [`vec_to_blob`]. Trailing bytes that do not
/// form a whole `f32` are ignored.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|bytes| {
            let mut word = [0u8; 4];
            word.copy_from_slice(bytes);
            f32::from_le_bytes(word)
        })
        .collect()
}

/// Cosine of the angle between `a` and `b`, in `[-1, 1]`.
///
/// Mismatched lengths, empty input, and zero-magnitude vectors all score
/// `0.0`, which sits below any useful similarity threshold.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }

    let (dot, norm_a, norm_b) = a
        .iter()
        .zip(b)
        .fold((0.0f32, 0.0f32, 0.0f32), |(dot, na, nb), (x, y)| {
            (dot + x * y, na + x * x, nb + y * y)
        });

    let magnitude = (norm_a * norm_b).sqrt();
    if magnitude < f32::EPSILON {
        0.0
    } else {
        dot / magnitude
    }
}

/// Cosine distance, `1 - cosine_similarity(a, b)`, in `[0, 2]`.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    1.0 - cosine_similarity(a, b)
}
