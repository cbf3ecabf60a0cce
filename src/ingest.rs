//! Corpus ingestion into the vector index.
//!
//! Every chunk text is encoded in one [`Embedder::encode_documents`] pass
//! and written with a single `upsert_many` call. Any failure along the way
//! surfaces as [`RagError::Ingestion`]; callers log it and keep serving.

use std::time::Duration;

use counsel_rag_core::models::DocumentChunk;
use counsel_rag_core::store::VectorIndex;
use counsel_rag_core::{RagError, Result};
use tracing::info;

use crate::embedding::{with_timeout, Embedder};

/// Encode and upsert `chunks`, returning how many were written.
pub async fn ingest_chunks(
    chunks: &[DocumentChunk],
    embedder: &Embedder,
    index: &dyn VectorIndex,
    timeout: Duration,
) -> Result<usize> {
    if chunks.is_empty() {
        return Ok(0);
    }

    let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
    let embeddings = embedder
        .encode_documents(&texts)
        .await
        .map_err(as_ingestion)?;

    let written = with_timeout("vector index upsert", timeout, index.upsert_many(chunks, &embeddings))
        .await
        .map_err(as_ingestion)?;

    info!(documents = written, "vector index updated");
    Ok(written)
}

/// Wrap any failure as [`RagError::Ingestion`], leaving existing ones as-is.
pub(crate) fn as_ingestion(err: RagError) -> RagError {
    match err {
        RagError::Ingestion(_) => err,
        other => RagError::Ingestion(other.to_string()),
    }
}
