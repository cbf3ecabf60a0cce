//! Knowledge corpus loading.
//!
//! The corpus file is a JSON object mapping topic ids to
//! `{content, keywords, examples}`. Loading never aborts the process: a
//! missing or malformed file yields an empty corpus and a warning, and the
//! service runs without knowledge until the file is fixed.

use std::path::Path;

use counsel_rag_core::{Corpus, RagError};
use tracing::{info, warn};

/// Read and parse the corpus at `path`.
pub fn try_load_corpus(path: &Path) -> Result<Corpus, RagError> {
    let raw = std::fs::read_to_string(path).map_err(|e| RagError::CorpusLoad {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    Corpus::from_json_str(&raw).map_err(|e| RagError::CorpusLoad {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

/// Load the corpus, degrading to an empty one on failure.
pub fn load_corpus(path: &Path) -> Corpus {
    match try_load_corpus(path) {
        Ok(corpus) => {
            info!(topics = corpus.len(), path = %path.display(), "knowledge corpus loaded");
            corpus
        }
        Err(e) => {
            warn!(error = %e, "knowledge corpus unavailable, continuing with an empty corpus");
            Corpus::new()
        }
    }
}
