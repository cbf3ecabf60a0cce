//! Error taxonomy for the retrieval core.
//!
//! None of these errors is fatal to the host process. Each variant maps to
//! a degraded behavior chosen by the orchestrator:
//!
//! | Variant | Degraded behavior |
//! |---------|-------------------|
//! | `CorpusLoad` | run with an empty corpus |
//! | `ModelUnavailable` | keyword mode for the process lifetime |
//! | `Embedding` / `IndexQuery` / `Timeout` | keyword fallback for one call |
//! | `Ingestion` | topic stays in memory, not vector-searchable |

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RagError {
    #[error("failed to load knowledge corpus from {path}: {reason}")]
    CorpusLoad { path: String, reason: String },

    #[error("embedding model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("embedding failed: {0}")]
    Embedding(String),

    #[error("vector index query failed: {0}")]
    IndexQuery(String),

    #[error("vector index ingestion failed: {0}")]
    Ingestion(String),

    #[error("{operation} timed out after {secs}s")]
    Timeout { operation: &'static str, secs: u64 },

    #[error("invalid topic: {0}")]
    InvalidTopic(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, RagError>;
