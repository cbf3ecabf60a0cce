//! Retrieval cache keyed by `(query, top_k)`.
//!
//! Bounded by entry count. When an insert pushes the cache past its
//! capacity, the `evict_count` entries inserted earliest are dropped in one
//! go. Eviction follows insertion order only: a cache hit does not refresh
//! an entry's position.
//!
//! Entries never expire on their own; callers clear the cache whenever the
//! corpus changes.

use std::collections::{HashMap, VecDeque};

use crate::models::SearchResult;

pub const DEFAULT_CAPACITY: usize = 100;
pub const DEFAULT_EVICT_COUNT: usize = 20;

type CacheKey = (String, usize);

#[derive(Debug)]
pub struct RetrievalCache {
    capacity: usize,
    evict_count: usize,
    entries: HashMap<CacheKey, Vec<SearchResult>>,
    order: VecDeque<CacheKey>,
}

impl Default for RetrievalCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_EVICT_COUNT)
    }
}

impl RetrievalCache {
    /// `evict_count` is clamped to `1..=capacity`.
    pub fn new(capacity: usize, evict_count: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            evict_count: evict_count.clamp(1, capacity),
            entries: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    pub fn get(&self, query: &str, top_k: usize) -> Option<&[SearchResult]> {
        self.entries
            .get(&(query.to_string(), top_k))
            .map(Vec::as_slice)
    }

    /// Store results for a key.
    ///
    /// Overwriting an existing key keeps its original insertion position.
    pub fn insert(&mut self, query: &str, top_k: usize, results: Vec<SearchResult>) {
        let key = (query.to_string(), top_k);
        if self.entries.insert(key.clone(), results).is_none() {
            self.order.push_back(key);
        }

        if self.entries.len() > self.capacity {
            for _ in 0..self.evict_count {
                match self.order.pop_front() {
                    Some(oldest) => {
                        self.entries.remove(&oldest);
                    }
                    None => break,
                }
            }
            tracing::debug!(
                evicted = self.evict_count,
                remaining = self.entries.len(),
                "retrieval cache evicted oldest entries"
            );
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
