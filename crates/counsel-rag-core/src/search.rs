//! Vector search post-processing.
//!
//! The caller embeds the query and asks its [`VectorIndex`](crate::store::VectorIndex)
//! for [`vector_candidate_count`] neighbors. [`collect_vector_results`]
//! then turns the nearest-first neighbor list into topic results:
//!
//! 1. Convert distance to similarity (`1 - distance`).
//! 2. Drop neighbors below the similarity threshold (and NaN scores).
//! 3. Keep only the first (best) chunk per topic.
//! 4. Look the topic up in the corpus and emit its full payload, scored
//!    with the chunk's similarity.
//! 5. Stop at `top_k` topics.

use std::collections::HashSet;

use crate::models::{Corpus, Neighbor, Score, SearchResult};

/// Upper bound on neighbors fetched per vector query.
pub const MAX_VECTOR_CANDIDATES: usize = 10;

/// Default minimum similarity for a vector hit.
pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.3;

/// Neighbors to request for `top_k` topics: `min(top_k * 2, 10)`.
///
/// Over-fetching leaves room for threshold filtering and topic dedup
/// without a second round-trip.
pub fn vector_candidate_count(top_k: usize) -> usize {
    top_k.saturating_mul(2).min(MAX_VECTOR_CANDIDATES)
}

/// Filter, dedupe, and enrich nearest-first `neighbors`.
///
/// A topic counts as seen once its best chunk passes the threshold, even
/// if it is no longer in the corpus; later chunks of it are skipped.
pub fn collect_vector_results(
    corpus: &Corpus,
    neighbors: &[Neighbor],
    similarity_threshold: f32,
    top_k: usize,
) -> Vec<SearchResult> {
    let mut results = Vec::new();
    if top_k == 0 {
        return results;
    }
    let mut seen_topics: HashSet<&str> = HashSet::new();

    for neighbor in neighbors {
        let similarity = neighbor.similarity();
        if similarity.is_nan() || similarity < similarity_threshold {
            continue;
        }

        let topic_id = neighbor.metadata.topic.as_str();
        if !seen_topics.insert(topic_id) {
            continue;
        }

        match corpus.get(topic_id) {
            Some(topic) => results.push(SearchResult::from_topic(
                topic_id,
                topic,
                Score::Similarity(similarity),
            )),
            None => {
                tracing::debug!(topic = %topic_id, id = %neighbor.id, "indexed chunk has no corpus topic");
            }
        }

        if results.len() >= top_k {
            break;
        }
    }

    results
}
