//! The retrieval orchestrator.
//!
//! [`RagSystem`] owns the corpus, the retrieval cache, and (when vector
//! mode is up) the embedder and vector index. It is built once at process
//! start and shared across request handlers.
//!
//! # Degradation
//!
//! | Failure | Effect |
//! |---------|--------|
//! | corpus file missing or malformed | empty corpus, searches return nothing |
//! | vector mode off in config | keyword search for the process lifetime |
//! | embedding model fails to load | keyword search for the process lifetime |
//! | index cannot be opened | keyword search for the process lifetime |
//! | bulk ingestion fails | vector mode stays on; retried at next start while the index is empty |
//! | query embedding or index query fails or times out | keyword search for that call only |
//! | embedder reports `ModelUnavailable` at query time | keyword search from then on |
//!
//! None of these reach the caller of [`RagSystem::search`]; every one is
//! logged.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use counsel_rag_core::cache::RetrievalCache;
use counsel_rag_core::chunk::{content_chunk, corpus_chunks};
use counsel_rag_core::context::format_context;
use counsel_rag_core::keyword::keyword_search;
use counsel_rag_core::search::{collect_vector_results, vector_candidate_count};
use counsel_rag_core::store::VectorIndex;
use counsel_rag_core::{Corpus, RagError, Result, SearchResult, Topic};

use crate::config::{Config, VectorDbConfig};
use crate::corpus::load_corpus;
use crate::embedding::{with_timeout, Embedder};
use crate::ingest::{as_ingestion, ingest_chunks};
use crate::sqlite_index::SqliteIndex;

/// Retrieval tunables, usually taken from [`Config`].
#[derive(Debug, Clone)]
pub struct RagSettings {
    pub similarity_threshold: f32,
    pub top_k: usize,
    pub cache_capacity: usize,
    pub cache_evict_count: usize,
    /// Upper bound on a single vector index call.
    pub index_timeout: Duration,
}

impl RagSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            similarity_threshold: config.retrieval.similarity_threshold,
            top_k: config.retrieval.top_k,
            cache_capacity: config.retrieval.cache_capacity,
            cache_evict_count: config.retrieval.cache_evict_count,
            index_timeout: Duration::from_secs(config.embedding.timeout_secs),
        }
    }
}

impl Default for RagSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// The embedder and index pair behind vector mode.
#[derive(Clone)]
pub struct VectorBackend {
    pub embedder: Embedder,
    pub index: Arc<dyn VectorIndex>,
}

impl VectorBackend {
    pub fn new(embedder: Embedder, index: Arc<dyn VectorIndex>) -> Self {
        Self { embedder, index }
    }
}

/// Snapshot returned by [`RagSystem::stats`].
#[derive(Debug, Clone, Serialize)]
pub struct RagStats {
    pub topics: usize,
    /// `None` when vector mode is off or the index could not be counted.
    pub indexed_documents: Option<usize>,
    pub cached_queries: usize,
    pub vector_enabled: bool,
    pub model: Option<String>,
    pub dims: Option<usize>,
}

pub struct RagSystem {
    settings: RagSettings,
    corpus: RwLock<Corpus>,
    cache: Mutex<RetrievalCache>,
    /// Bumped on every cache clear so that searches which started before
    /// a clear do not repopulate the cache with stale results.
    cache_epoch: AtomicU64,
    vector: Option<VectorBackend>,
    vector_enabled: AtomicBool,
}

impl RagSystem {
    /// Bootstrap from configuration, degrading rather than failing.
    ///
    /// Loads the corpus, then (if `use_vector_db`) loads the embedding
    /// model and opens the persisted index. A new or empty collection is
    /// populated by a full ingestion pass.
    pub async fn new(config: &Config) -> Self {
        let corpus = load_corpus(&config.knowledge.path);
        let settings = RagSettings::from_config(config);

        let vector = if config.vector_db.use_vector_db {
            init_vector_backend(config, &corpus, settings.index_timeout).await
        } else {
            info!("vector search disabled by configuration, using keyword search");
            None
        };

        Self::from_parts(settings, corpus, vector)
    }

    /// Assemble a system from already-built parts. No ingestion happens.
    pub fn from_parts(settings: RagSettings, corpus: Corpus, vector: Option<VectorBackend>) -> Self {
        let cache = RetrievalCache::new(settings.cache_capacity, settings.cache_evict_count);
        Self {
            settings,
            corpus: RwLock::new(corpus),
            cache: Mutex::new(cache),
            cache_epoch: AtomicU64::new(0),
            vector_enabled: AtomicBool::new(vector.is_some()),
            vector,
        }
    }

    pub fn settings(&self) -> &RagSettings {
        &self.settings
    }

    pub fn is_vector_enabled(&self) -> bool {
        self.vector_enabled.load(Ordering::SeqCst)
    }

    fn active_backend(&self) -> Option<&VectorBackend> {
        self.vector.as_ref().filter(|_| self.is_vector_enabled())
    }

    pub fn corpus_len(&self) -> usize {
        self.corpus.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn topic(&self, id: &str) -> Option<Topic> {
        self.corpus
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    pub fn cached_queries(&self) -> usize {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Retrieve up to `top_k` topics relevant to `query`.
    ///
    /// Never fails: vector search errors fall back to keyword search for
    /// this call, and `ModelUnavailable` turns vector mode off for good.
    /// Non-empty results are cached under `(query, top_k)` when `use_cache`
    /// is set.
    pub async fn search(&self, query: &str, top_k: usize, use_cache: bool) -> Vec<SearchResult> {
        if top_k == 0 {
            return Vec::new();
        }

        let epoch = if use_cache {
            let cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(hit) = cache.get(query, top_k) {
                debug!(query, top_k, "retrieval cache hit");
                return hit.to_vec();
            }
            self.cache_epoch.load(Ordering::SeqCst)
        } else {
            0
        };

        let results = match self.active_backend() {
            Some(backend) => match self.vector_search(backend, query, top_k).await {
                Ok(results) => results,
                Err(RagError::ModelUnavailable(reason)) => {
                    warn!(%reason, "embedding model unavailable, switching to keyword search");
                    self.vector_enabled.store(false, Ordering::SeqCst);
                    self.keyword_search(query, top_k)
                }
                Err(e) => {
                    warn!(error = %e, "vector search failed, falling back to keyword search");
                    self.keyword_search(query, top_k)
                }
            },
            None => self.keyword_search(query, top_k),
        };

        if use_cache && !results.is_empty() {
            let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
            if self.cache_epoch.load(Ordering::SeqCst) == epoch {
                cache.insert(query, top_k, results.clone());
            }
        }

        results
    }

    /// Vector search only. Errors are returned, not recovered.
    pub async fn vector_search(
        &self,
        backend: &VectorBackend,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<SearchResult>> {
        let embedding = backend.embedder.encode_query(query).await?;
        let neighbors = with_timeout(
            "vector index query",
            self.settings.index_timeout,
            backend
                .index
                .query(&embedding, vector_candidate_count(top_k)),
        )
        .await?;

        let corpus = self.corpus.read().unwrap_or_else(PoisonError::into_inner);
        Ok(collect_vector_results(
            &corpus,
            &neighbors,
            self.settings.similarity_threshold,
            top_k,
        ))
    }

    /// Keyword search over the current corpus.
    pub fn keyword_search(&self, query: &str, top_k: usize) -> Vec<SearchResult> {
        let corpus = self.corpus.read().unwrap_or_else(PoisonError::into_inner);
        keyword_search(&corpus, query, top_k)
    }

    pub fn format_context(&self, results: &[SearchResult]) -> String {
        format_context(results)
    }

    /// Insert or overwrite a topic, then clear the cache.
    ///
    /// In vector mode only the content chunk is indexed; examples of the
    /// new topic are not. An indexing failure is logged and the topic stays
    /// in the corpus, reachable by keyword search.
    pub async fn add_document(
        &self,
        topic: &str,
        content: &str,
        keywords: Vec<String>,
        examples: Vec<String>,
    ) -> Result<()> {
        if topic.trim().is_empty() {
            return Err(RagError::InvalidTopic("topic id must not be empty".into()));
        }
        if content.trim().is_empty() {
            return Err(RagError::InvalidTopic(format!(
                "topic '{}' has empty content",
                topic
            )));
        }

        let record = Topic::new(content, keywords, examples);
        let chunk = content_chunk(topic, &record);
        let replaced = self
            .corpus
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(topic, record)
            .is_some();
        info!(topic, replaced, "knowledge topic added");

        if let Some(backend) = self.active_backend() {
            if let Err(e) = ingest_chunks(
                &[chunk],
                &backend.embedder,
                backend.index.as_ref(),
                self.settings.index_timeout,
            )
            .await
            {
                warn!(topic, error = %e, "topic added but not vector-indexed");
            }
        }

        self.clear_cache();
        Ok(())
    }

    pub fn clear_cache(&self) {
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        self.cache_epoch.fetch_add(1, Ordering::SeqCst);
        let dropped = cache.len();
        cache.clear();
        info!(dropped, "retrieval cache cleared");
    }

    /// Drop every indexed vector and re-ingest the current corpus.
    pub async fn reindex(&self) -> Result<usize> {
        let backend = self.active_backend().ok_or_else(|| {
            RagError::ModelUnavailable("vector search is not enabled".to_string())
        })?;

        with_timeout(
            "vector index reset",
            self.settings.index_timeout,
            backend.index.reset(),
        )
        .await
        .map_err(as_ingestion)?;

        let chunks = {
            let corpus = self.corpus.read().unwrap_or_else(PoisonError::into_inner);
            corpus_chunks(&corpus)
        };
        let written = ingest_chunks(
            &chunks,
            &backend.embedder,
            backend.index.as_ref(),
            self.settings.index_timeout,
        )
        .await?;

        self.clear_cache();
        Ok(written)
    }

    pub async fn stats(&self) -> RagStats {
        let indexed_documents = match self.active_backend() {
            Some(backend) => match backend.index.count().await {
                Ok(n) => Some(n),
                Err(e) => {
                    warn!(error = %e, "could not count indexed documents");
                    None
                }
            },
            None => None,
        };

        let backend = self.active_backend();
        RagStats {
            topics: self.corpus_len(),
            indexed_documents,
            cached_queries: self.cached_queries(),
            vector_enabled: self.is_vector_enabled(),
            model: backend.map(|b| b.embedder.model_name().to_string()),
            dims: backend.map(|b| b.embedder.dims()),
        }
    }
}

async fn init_vector_backend(
    config: &Config,
    corpus: &Corpus,
    timeout: Duration,
) -> Option<VectorBackend> {
    if !config.embedding.is_enabled() {
        info!("embedding provider disabled, using keyword search");
        return None;
    }

    // Model loading blocks, so keep it off the async workers.
    let embedding_config = config.embedding.clone();
    let loaded = tokio::task::spawn_blocking(move || Embedder::from_config(&embedding_config))
        .await
        .map_err(|e| RagError::ModelUnavailable(format!("model loading task failed: {}", e)))
        .and_then(|r| r);
    let embedder = match loaded {
        Ok(embedder) => embedder,
        Err(e) => {
            warn!(error = %e, "embedding model unavailable, using keyword search");
            return None;
        }
    };

    init_vector_backend_with(embedder, &config.vector_db, corpus, timeout).await
}

/// Open the persisted index for `embedder` and populate it on first use.
///
/// The corpus is ingested when the collection was just created or still
/// holds no vectors, so a failed first ingestion is retried on the next
/// start. A populated collection is left alone. Returns `None` when the
/// index cannot be opened.
pub async fn init_vector_backend_with(
    embedder: Embedder,
    vector_db: &VectorDbConfig,
    corpus: &Corpus,
    timeout: Duration,
) -> Option<VectorBackend> {
    let (index, created) = match SqliteIndex::open(vector_db).await {
        Ok(opened) => opened,
        Err(e) => {
            warn!(error = %e, "vector index unavailable, using keyword search");
            return None;
        }
    };

    let needs_ingestion = if created {
        info!(collection = index.collection(), "created vector collection, ingesting corpus");
        true
    } else {
        match with_timeout("vector index count", timeout, index.count()).await {
            Ok(0) => {
                info!(collection = index.collection(), "vector collection is empty, ingesting corpus");
                true
            }
            Ok(documents) => {
                info!(
                    collection = index.collection(),
                    documents,
                    "loaded existing vector collection"
                );
                false
            }
            Err(e) => {
                warn!(error = %e, "could not count existing vector collection");
                false
            }
        }
    };

    if needs_ingestion {
        if let Err(e) = ingest_chunks(&corpus_chunks(corpus), &embedder, &index, timeout).await {
            warn!(error = %e, "initial ingestion failed, will retry on next start");
        }
    }

    Some(VectorBackend::new(embedder, Arc::new(index)))
}
