//! TOML configuration parsing and validation.
//!
//! Every section and field has a default, so an empty file (or
//! [`Config::default`]) describes the reference setup: a local multilingual
//! sentence-embedding model, vector search enabled with a 0.3 similarity
//! threshold, the index persisted under `./chroma_db`, and two results per
//! query.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use counsel_rag_core::cache::{DEFAULT_CAPACITY, DEFAULT_EVICT_COUNT};
use counsel_rag_core::search::DEFAULT_SIMILARITY_THRESHOLD;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub knowledge: KnowledgeConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub vector_db: VectorDbConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct KnowledgeConfig {
    #[serde(default = "default_knowledge_path")]
    pub path: PathBuf,
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            path: default_knowledge_path(),
        }
    }
}

fn default_knowledge_path() -> PathBuf {
    PathBuf::from("knowledge_base.json")
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Base URL for the Ollama provider.
    #[serde(default)]
    pub url: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            dims: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
            url: None,
        }
    }
}

fn default_provider() -> String {
    "local".to_string()
}
fn default_model() -> Option<String> {
    Some("paraphrase-multilingual-minilm-l12-v2".to_string())
}
fn default_batch_size() -> usize {
    32
}
fn default_max_retries() -> u32 {
    3
}
fn default_timeout_secs() -> u64 {
    30
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct VectorDbConfig {
    #[serde(default = "default_true")]
    pub use_vector_db: bool,
    #[serde(default = "default_persist_directory")]
    pub persist_directory: PathBuf,
    #[serde(default = "default_collection")]
    pub collection: String,
}

impl Default for VectorDbConfig {
    fn default() -> Self {
        Self {
            use_vector_db: true,
            persist_directory: default_persist_directory(),
            collection: default_collection(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_persist_directory() -> PathBuf {
    PathBuf::from("./chroma_db")
}
fn default_collection() -> String {
    "counseling_knowledge".to_string()
}

impl VectorDbConfig {
    /// SQLite file holding every collection.
    pub fn db_path(&self) -> PathBuf {
        self.persist_directory.join("index.sqlite3")
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
    #[serde(default = "default_cache_evict_count")]
    pub cache_evict_count: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: default_similarity_threshold(),
            top_k: default_top_k(),
            cache_capacity: default_cache_capacity(),
            cache_evict_count: default_cache_evict_count(),
        }
    }
}

fn default_similarity_threshold() -> f32 {
    DEFAULT_SIMILARITY_THRESHOLD
}
fn default_top_k() -> usize {
    2
}
fn default_cache_capacity() -> usize {
    DEFAULT_CAPACITY
}
fn default_cache_evict_count() -> usize {
    DEFAULT_EVICT_COUNT
}

/// Read and validate a config file.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    let retrieval = &config.retrieval;
    if !(0.0..=1.0).contains(&retrieval.similarity_threshold) {
        anyhow::bail!("retrieval.similarity_threshold must be in [0.0, 1.0]");
    }
    if retrieval.top_k < 1 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }
    if retrieval.cache_capacity < 1 {
        anyhow::bail!("retrieval.cache_capacity must be >= 1");
    }
    if retrieval.cache_evict_count < 1 || retrieval.cache_evict_count > retrieval.cache_capacity {
        anyhow::bail!("retrieval.cache_evict_count must be in [1, cache_capacity]");
    }

    let embedding = &config.embedding;
    if embedding.batch_size == 0 {
        anyhow::bail!("embedding.batch_size must be > 0");
    }
    if embedding.timeout_secs == 0 {
        anyhow::bail!("embedding.timeout_secs must be > 0");
    }

    match embedding.provider.as_str() {
        "disabled" | "local" => {}
        "openai" | "ollama" => {
            if embedding.dims.is_none() || embedding.dims == Some(0) {
                anyhow::bail!(
                    "embedding.dims must be > 0 when provider is '{}'",
                    embedding.provider
                );
            }
            if embedding.model.is_none() {
                anyhow::bail!(
                    "embedding.model must be specified when provider is '{}'",
                    embedding.provider
                );
            }
        }
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled, local, ollama, or openai.",
            other
        ),
    }

    if config.vector_db.collection.trim().is_empty() {
        anyhow::bail!("vector_db.collection must not be empty");
    }

    Ok(())
}
