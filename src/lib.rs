//! # Counsel RAG
//!
//! Knowledge retrieval for an emotional-counseling chat service. Given a
//! user message, it finds the most relevant knowledge topics and renders
//! them as a context block to prepend to the language-model prompt.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//! │ knowledge    │──▶│  Embedder    │──▶│ SqliteIndex  │
//! │ base (JSON)  │   │ (fastembed)  │   │ (persisted)  │
//! └──────┬───────┘   └──────────────┘   └──────┬───────┘
//!        │                                     │
//!        ▼                                     ▼
//!   ┌──────────┐      fallback         ┌──────────────┐
//!   │ keyword  │◀──────────────────────│  RagSystem   │──▶ context
//!   │ matcher  │                       │ + FIFO cache │
//!   └──────────┘                       └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! counsel-rag init                         # load model, build the index
//! counsel-rag search "我刚刚分手了"
//! counsel-rag context "最近总是失眠" --top-k 3
//! counsel-rag stats
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`corpus`] | Knowledge corpus file loading |
//! | [`db`] | SQLite connection pool |
//! | [`migrate`] | Index schema |
//! | [`sqlite_index`] | Persisted vector index |
//! | [`embedding`] | Embedding providers and the batching front-end |
//! | [`ingest`] | Corpus ingestion into the index |
//! | [`rag`] | The retrieval orchestrator |
//! | [`search`] | `search` / `context` commands |
//! | [`stats`] | `stats` command |
//!
//! Pure logic (keyword matching, cache, result post-processing, context
//! formatting) lives in the `counsel-rag-core` crate.

pub mod config;
pub mod corpus;
pub mod db;
pub mod embedding;
pub mod ingest;
pub mod migrate;
pub mod rag;
pub mod search;
pub mod sqlite_index;
pub mod stats;

pub use counsel_rag_core::{Corpus, RagError, Score, SearchResult, Topic};
pub use rag::{RagSettings, RagStats, RagSystem, VectorBackend};
