//! Keyword fallback matcher.
//!
//! Scores topics by literal keyword containment when vector search is
//! disabled or fails. A keyword counts once if it occurs anywhere in the
//! lowercased query; multi-word keywords must appear verbatim. There is no
//! tokenization, so this works the same for Chinese and English text.

use crate::models::{Corpus, Score, SearchResult};

/// Number of `keywords` contained in `query_lower`.
///
/// Keywords are lowercased before comparison. Blank keywords never match.
pub fn keyword_score(query_lower: &str, keywords: &[String]) -> u32 {
    keywords
        .iter()
        .filter(|k| !k.trim().is_empty())
        .filter(|k| query_lower.contains(k.to_lowercase().as_str()))
        .count() as u32
}

/// Rank corpus topics by keyword hits.
///
/// Zero-score topics are dropped. The sort is stable, so equal scores keep
/// corpus order.
pub fn keyword_search(corpus: &Corpus, query: &str, top_k: usize) -> Vec<SearchResult> {
    if top_k == 0 {
        return Vec::new();
    }
    let query_lower = query.to_lowercase();

    let mut scored: Vec<(u32, &str)> = corpus
        .iter()
        .filter_map(|(id, topic)| {
            let score = keyword_score(&query_lower, &topic.keywords);
            (score > 0).then_some((score, id))
        })
        .collect();

    scored.sort_by(|a, b| b.0.cmp(&a.0));
    scored.truncate(top_k);

    scored
        .into_iter()
        .filter_map(|(score, id)| {
            corpus
                .get(id)
                .map(|topic| SearchResult::from_topic(id, topic, Score::KeywordHits(score)))
        })
        .collect()
}
