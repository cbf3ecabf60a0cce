//! End-to-end tests for [`RagSystem`]: dispatch between vector and keyword
//! search, caching, corpus mutation, and every degradation path.
//!
//! Embeddings come from a deterministic provider that maps a few marker
//! words to axes, so similarities are exact and no model is downloaded.

use async_trait::async_trait;
use counsel_rag::config::{Config, VectorDbConfig};
use counsel_rag::embedding::Embedder;
use counsel_rag::rag::{init_vector_backend_with, RagSettings, RagSystem, VectorBackend};
use counsel_rag::sqlite_index::SqliteIndex;
use counsel_rag_core::embedding::EmbeddingProvider;
use counsel_rag_core::models::{DocumentChunk, Neighbor};
use counsel_rag_core::store::memory::InMemoryIndex;
use counsel_rag_core::store::VectorIndex;
use counsel_rag_core::{Corpus, RagError, Result, Score, Topic};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

// ─── Test doubles ───────────────────────────────────────────────────

/// Marker words and the axis each one lights up.
const AXES: &[(&str, usize)] = &[
    ("分手", 0),
    ("breakup", 0),
    ("被甩", 0),
    ("焦虑", 1),
    ("anxiety", 1),
    ("失眠", 2),
    ("sleep", 2),
];
const DIMS: usize = 4;

fn axis_vector(text: &str) -> Vec<f32> {
    let lower = text.to_lowercase();
    let mut v = vec![0.0; DIMS];
    for (marker, axis) in AXES {
        if lower.contains(marker) {
            v[*axis] = 1.0;
        }
    }
    if v.iter().all(|x| *x == 0.0) {
        v[DIMS - 1] = 1.0;
    }
    v
}

/// Deterministic provider counting query embeddings.
#[derive(Default)]
struct AxisProvider {
    queries: AtomicUsize,
    batches: AtomicUsize,
}

#[async_trait]
impl EmbeddingProvider for AxisProvider {
    fn model_name(&self) -> &str {
        "axis-test"
    }
    fn dims(&self) -> usize {
        DIMS
    }
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        Ok(axis_vector(text))
    }
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.batches.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|t| axis_vector(t)).collect())
    }
}

/// Index whose queries always fail.
struct BrokenIndex;

#[async_trait]
impl VectorIndex for BrokenIndex {
    async fn upsert_many(&self, chunks: &[DocumentChunk], _: &[Vec<f32>]) -> Result<usize> {
        Ok(chunks.len())
    }
    async fn query(&self, _: &[f32], _: usize) -> Result<Vec<Neighbor>> {
        Err(RagError::IndexQuery("collection is corrupt".into()))
    }
    async fn count(&self) -> Result<usize> {
        Err(RagError::IndexQuery("collection is corrupt".into()))
    }
    async fn reset(&self) -> Result<()> {
        Ok(())
    }
}

/// Index whose queries never finish in time.
struct StalledIndex;

#[async_trait]
impl VectorIndex for StalledIndex {
    async fn upsert_many(&self, chunks: &[DocumentChunk], _: &[Vec<f32>]) -> Result<usize> {
        Ok(chunks.len())
    }
    async fn query(&self, _: &[f32], _: usize) -> Result<Vec<Neighbor>> {
        tokio::time::sleep(Duration::from_secs(10)).await;
        Ok(Vec::new())
    }
    async fn count(&self) -> Result<usize> {
        Ok(0)
    }
    async fn reset(&self) -> Result<()> {
        Ok(())
    }
}

// ─── Fixtures ───────────────────────────────────────────────────────

fn corpus() -> Corpus {
    let mut corpus = Corpus::new();
    corpus.insert(
        "breakup",
        Topic::new(
            "Grief guidance after a breakup.",
            vec!["分手".into(), "失恋".into()],
            vec!["我们分手了".into(), "被甩了好难过".into()],
        ),
    );
    corpus.insert(
        "anxiety",
        Topic::new(
            "Breathing exercises for anxiety.",
            vec!["焦虑".into()],
            vec!["我很焦虑".into()],
        ),
    );
    corpus.insert(
        "insomnia",
        Topic::new("Sleep hygiene tips.", vec!["失眠".into()], vec![]),
    );
    corpus
}

fn settings() -> RagSettings {
    RagSettings {
        index_timeout: Duration::from_millis(200),
        ..RagSettings::default()
    }
}

fn embedder(provider: &Arc<AxisProvider>) -> Embedder {
    Embedder::new(provider.clone(), 32, Duration::from_secs(5))
}

/// A vector-mode system over an in-memory index populated via `reindex`.
async fn vector_system(provider: &Arc<AxisProvider>) -> RagSystem {
    let backend = VectorBackend::new(embedder(provider), Arc::new(InMemoryIndex::new()));
    let rag = RagSystem::from_parts(settings(), corpus(), Some(backend));
    let written = rag.reindex().await.unwrap();
    assert_eq!(written, 6);
    rag
}

fn keyword_system() -> RagSystem {
    RagSystem::from_parts(settings(), corpus(), None)
}

// ─── Vector search ──────────────────────────────────────────────────

#[tokio::test]
async fn test_vector_search_dedupes_topics() {
    let provider = Arc::new(AxisProvider::default());
    let rag = vector_system(&provider).await;

    // All three breakup chunks are exact matches; only one result survives.
    let results = rag.search("分手", 2, false).await;
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].topic, "breakup");
    assert_eq!(results[0].score, Score::Similarity(1.0));
    assert_eq!(results[0].content, "Grief guidance after a breakup.");
    assert_eq!(results[0].examples.len(), 2);
}

#[tokio::test]
async fn test_vector_search_respects_threshold() {
    let provider = Arc::new(AxisProvider::default());
    let rag = vector_system(&provider).await;

    // Mixed query: breakup and anxiety at ~0.707, insomnia at 0.
    let results = rag.search("分手以后很焦虑", 3, false).await;
    let mut topics: Vec<&str> = results.iter().map(|r| r.topic.as_str()).collect();
    topics.sort();
    assert_eq!(topics, vec!["anxiety", "breakup"]);
    for r in &results {
        assert!(r.score.value() >= 0.3);
        assert!((r.score.value() - std::f64::consts::FRAC_1_SQRT_2).abs() < 1e-4);
    }

    // Nothing clears the threshold.
    assert!(rag.search("今天天气真好", 2, false).await.is_empty());
}

#[tokio::test]
async fn test_results_feed_context_formatter() {
    let provider = Arc::new(AxisProvider::default());
    let rag = vector_system(&provider).await;

    let results = rag.search("分手", 2, true).await;
    let context = rag.format_context(&results);
    assert!(context.starts_with("以下是相关的专业知识，请参考："));
    assert!(context.contains("【breakup】\nGrief guidance after a breakup."));

    assert_eq!(rag.format_context(&[]), "");
}

// ─── Cache ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_repeated_search_is_served_from_cache() {
    let provider = Arc::new(AxisProvider::default());
    let rag = vector_system(&provider).await;

    let first = rag.search("分手", 2, true).await;
    let second = rag.search("分手", 2, true).await;

    assert_eq!(first, second);
    assert_eq!(provider.queries.load(Ordering::SeqCst), 1);
    assert_eq!(rag.cached_queries(), 1);

    // A different top_k is a different key.
    rag.search("分手", 1, true).await;
    assert_eq!(provider.queries.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_no_cache_always_recomputes() {
    let provider = Arc::new(AxisProvider::default());
    let rag = vector_system(&provider).await;

    rag.search("分手", 2, false).await;
    rag.search("分手", 2, false).await;
    assert_eq!(provider.queries.load(Ordering::SeqCst), 2);
    assert_eq!(rag.cached_queries(), 0);
}

#[tokio::test]
async fn test_empty_results_are_not_cached() {
    let rag = keyword_system();
    assert!(rag.search("今天天气真好", 2, true).await.is_empty());
    assert_eq!(rag.cached_queries(), 0);
}

#[tokio::test]
async fn test_cache_evicts_earliest_twenty_past_capacity() {
    let provider = Arc::new(AxisProvider::default());
    let rag = vector_system(&provider).await;

    for i in 0..101 {
        rag.search(&format!("分手 {}", i), 2, true).await;
    }
    assert_eq!(rag.cached_queries(), 81);
    assert_eq!(provider.queries.load(Ordering::SeqCst), 101);

    // Recent keys still hit.
    rag.search("分手 100", 2, true).await;
    rag.search("分手 20", 2, true).await;
    assert_eq!(provider.queries.load(Ordering::SeqCst), 101);

    // The earliest key was evicted and is recomputed.
    rag.search("分手 0", 2, true).await;
    assert_eq!(provider.queries.load(Ordering::SeqCst), 102);
}

// ─── Corpus mutation ────────────────────────────────────────────────

#[tokio::test]
async fn test_add_document_clears_cache() {
    let rag = keyword_system();

    let before = rag.search("我失恋了", 2, true).await;
    assert_eq!(before[0].content, "Grief guidance after a breakup.");
    assert_eq!(rag.cached_queries(), 1);

    rag.add_document(
        "breakup",
        "Updated grief guidance.",
        vec!["失恋".into()],
        vec![],
    )
    .await
    .unwrap();
    assert_eq!(rag.cached_queries(), 0);

    let after = rag.search("我失恋了", 2, true).await;
    assert_eq!(after[0].content, "Updated grief guidance.");
    assert_eq!(rag.corpus_len(), 3);
}

#[tokio::test]
async fn test_add_document_indexes_content_only() {
    let provider = Arc::new(AxisProvider::default());
    let index = Arc::new(InMemoryIndex::new());
    let backend = VectorBackend::new(embedder(&provider), index.clone());
    let rag = RagSystem::from_parts(settings(), corpus(), Some(backend));

    rag.add_document(
        "sleep_anxiety",
        "Anxiety at bedtime.",
        vec!["睡前".into()],
        vec!["睡前很焦虑".into(), "想太多睡不着".into()],
    )
    .await
    .unwrap();

    assert_eq!(index.count().await.unwrap(), 1);
    let results = rag.search("焦虑", 2, false).await;
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].topic, "sleep_anxiety");
    assert_eq!(results[0].examples.len(), 2);
}

#[tokio::test]
async fn test_add_document_rejects_empty_content() {
    let rag = keyword_system();
    let err = rag
        .add_document("blank", "   ", vec![], vec![])
        .await
        .unwrap_err();
    assert!(matches!(err, RagError::InvalidTopic(_)));
    assert!(rag.topic("blank").is_none());
}

#[tokio::test]
async fn test_add_document_survives_indexing_failure() {
    let backend = VectorBackend::new(
        Embedder::disabled("model went away"),
        Arc::new(InMemoryIndex::new()),
    );
    let rag = RagSystem::from_parts(settings(), corpus(), Some(backend));

    rag.add_document("grief", "Loss of a pet.", vec!["宠物".into()], vec![])
        .await
        .unwrap();

    assert!(rag.topic("grief").is_some());
    let results = rag.search("我的宠物走了", 2, true).await;
    assert_eq!(results[0].topic, "grief");
}

// ─── Degradation ────────────────────────────────────────────────────

#[tokio::test]
async fn test_keyword_mode_breakup_scenario() {
    let rag = keyword_system();
    assert!(!rag.is_vector_enabled());

    let results = rag.search("我刚刚分手了", 2, true).await;
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].topic, "breakup");
    assert_eq!(results[0].score, Score::KeywordHits(1));

    assert!(rag.search("今天天气真好", 2, true).await.is_empty());
}

#[tokio::test]
async fn test_index_failure_falls_back_for_that_call() {
    let provider = Arc::new(AxisProvider::default());
    let backend = VectorBackend::new(embedder(&provider), Arc::new(BrokenIndex));
    let rag = RagSystem::from_parts(settings(), corpus(), Some(backend));

    let results = rag.search("我刚刚分手了", 2, false).await;
    assert_eq!(results[0].score, Score::KeywordHits(1));

    // Vector mode stays on and is tried again on the next call.
    assert!(rag.is_vector_enabled());
    rag.search("我很焦虑", 2, false).await;
    assert_eq!(provider.queries.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_index_timeout_falls_back_to_keywords() {
    let provider = Arc::new(AxisProvider::default());
    let backend = VectorBackend::new(embedder(&provider), Arc::new(StalledIndex));
    let rag = RagSystem::from_parts(settings(), corpus(), Some(backend));

    let results = rag.search("最近总是失眠", 2, false).await;
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].topic, "insomnia");
    assert_eq!(results[0].score, Score::KeywordHits(1));
    assert!(rag.is_vector_enabled());
}

#[tokio::test]
async fn test_model_unavailable_switches_to_keyword_mode() {
    let backend = VectorBackend::new(
        Embedder::disabled("model failed to load"),
        Arc::new(InMemoryIndex::new()),
    );
    let rag = RagSystem::from_parts(settings(), corpus(), Some(backend));
    assert!(rag.is_vector_enabled());

    let results = rag.search("我刚刚分手了", 2, true).await;
    assert_eq!(results[0].topic, "breakup");
    assert!(!rag.is_vector_enabled());
    assert!(matches!(
        rag.reindex().await,
        Err(RagError::ModelUnavailable(_))
    ));
}

fn write_corpus(tmp: &TempDir) -> std::path::PathBuf {
    let path = tmp.path().join("knowledge_base.json");
    std::fs::write(
        &path,
        r#"{"breakup": {"content": "Grief guidance...", "keywords": ["分手", "失恋"], "examples": []}}"#,
    )
    .unwrap();
    path
}

#[tokio::test]
async fn test_model_load_failure_at_startup_uses_keywords() {
    let tmp = TempDir::new().unwrap();
    let mut config = Config::default();
    config.knowledge.path = write_corpus(&tmp);
    config.embedding.model = Some("no-such-model".to_string());
    config.vector_db.persist_directory = tmp.path().join("chroma_db");

    let rag = RagSystem::new(&config).await;

    assert!(!rag.is_vector_enabled());
    assert_eq!(rag.corpus_len(), 1);
    let results = rag.search("我刚刚分手了", 2, true).await;
    assert_eq!(results[0].topic, "breakup");
    assert_eq!(results[0].score, Score::KeywordHits(1));
}

#[tokio::test]
async fn test_vector_mode_disabled_by_config() {
    let tmp = TempDir::new().unwrap();
    let mut config = Config::default();
    config.knowledge.path = write_corpus(&tmp);
    config.vector_db.use_vector_db = false;
    config.vector_db.persist_directory = tmp.path().join("chroma_db");

    let rag = RagSystem::new(&config).await;

    assert!(!rag.is_vector_enabled());
    assert!(!tmp.path().join("chroma_db").exists());
    let stats = rag.stats().await;
    assert_eq!(stats.topics, 1);
    assert_eq!(stats.indexed_documents, None);
    assert_eq!(stats.model, None);
    assert_eq!(stats.dims, None);
}

#[tokio::test]
async fn test_missing_corpus_runs_empty() {
    let tmp = TempDir::new().unwrap();
    let mut config = Config::default();
    config.knowledge.path = tmp.path().join("absent.json");
    config.vector_db.use_vector_db = false;

    let rag = RagSystem::new(&config).await;

    assert_eq!(rag.corpus_len(), 0);
    assert!(rag.search("我刚刚分手了", 2, true).await.is_empty());
}

// ─── Persistence ────────────────────────────────────────────────────

fn vector_db_config(tmp: &TempDir) -> VectorDbConfig {
    VectorDbConfig {
        use_vector_db: true,
        persist_directory: tmp.path().join("chroma_db"),
        collection: "counseling_knowledge".to_string(),
    }
}

#[tokio::test]
async fn test_sqlite_index_persists_across_restarts() {
    let tmp = TempDir::new().unwrap();

    {
        let provider = Arc::new(AxisProvider::default());
        let (index, created) = SqliteIndex::open(&vector_db_config(&tmp)).await.unwrap();
        assert!(created);
        let backend = VectorBackend::new(embedder(&provider), Arc::new(index));
        let rag = RagSystem::from_parts(settings(), corpus(), Some(backend));
        assert_eq!(rag.reindex().await.unwrap(), 6);
        assert_eq!(provider.batches.load(Ordering::SeqCst), 1);
    }

    let provider = Arc::new(AxisProvider::default());
    let (index, created) = SqliteIndex::open(&vector_db_config(&tmp)).await.unwrap();
    assert!(!created);
    let backend = VectorBackend::new(embedder(&provider), Arc::new(index));
    let rag = RagSystem::from_parts(settings(), corpus(), Some(backend));

    let results = rag.search("失眠", 2, true).await;
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].topic, "insomnia");
    assert_eq!(results[0].score, Score::Similarity(1.0));
    assert_eq!(provider.batches.load(Ordering::SeqCst), 0);

    let stats = rag.stats().await;
    assert_eq!(stats.indexed_documents, Some(6));
    assert_eq!(stats.model.as_deref(), Some("axis-test"));
    assert_eq!(stats.dims, Some(DIMS));
    assert!(stats.vector_enabled);
}

#[tokio::test]
async fn test_first_start_ingests_and_restart_reuses_index() {
    let tmp = TempDir::new().unwrap();
    let timeout = Duration::from_secs(5);

    {
        let provider = Arc::new(AxisProvider::default());
        let backend =
            init_vector_backend_with(embedder(&provider), &vector_db_config(&tmp), &corpus(), timeout)
                .await
                .unwrap();
        assert_eq!(backend.index.count().await.unwrap(), 6);
        assert_eq!(provider.batches.load(Ordering::SeqCst), 1);
    }

    let provider = Arc::new(AxisProvider::default());
    let backend =
        init_vector_backend_with(embedder(&provider), &vector_db_config(&tmp), &corpus(), timeout)
            .await
            .unwrap();
    assert_eq!(provider.batches.load(Ordering::SeqCst), 0);

    // No keyword matches "被甩了", so only the persisted vectors can answer.
    let rag = RagSystem::from_parts(settings(), corpus(), Some(backend));
    let results = rag.search("被甩了", 2, false).await;
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].topic, "breakup");
    assert_eq!(results[0].score, Score::Similarity(1.0));
    assert_eq!(provider.queries.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_failed_first_ingestion_is_retried_on_next_start() {
    let tmp = TempDir::new().unwrap();
    let timeout = Duration::from_secs(5);

    {
        let backend = init_vector_backend_with(
            Embedder::disabled("model went away"),
            &vector_db_config(&tmp),
            &corpus(),
            timeout,
        )
        .await
        .unwrap();
        assert_eq!(backend.index.count().await.unwrap(), 0);
    }

    let provider = Arc::new(AxisProvider::default());
    let backend =
        init_vector_backend_with(embedder(&provider), &vector_db_config(&tmp), &corpus(), timeout)
            .await
            .unwrap();
    assert_eq!(backend.index.count().await.unwrap(), 6);
    assert_eq!(provider.batches.load(Ordering::SeqCst), 1);

    let rag = RagSystem::from_parts(settings(), corpus(), Some(backend));
    let results = rag.search("我刚刚分手了", 2, false).await;
    assert_eq!(results[0].topic, "breakup");
    assert_eq!(results[0].score, Score::Similarity(1.0));
}
