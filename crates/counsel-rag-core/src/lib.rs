//! # Counsel RAG Core
//!
//! Shared, runtime-agnostic logic for the counseling knowledge retriever:
//! the topic corpus model, chunking of topics into indexable documents,
//! the keyword fallback matcher, the FIFO retrieval cache, vector-result
//! post-processing, and prompt context formatting.
//!
//! The [`embedding::EmbeddingProvider`] and [`store::VectorIndex`] traits
//! are the seams where the application plugs in real backends. This crate
//! contains no tokio, sqlx, or filesystem I/O.

pub mod cache;
pub mod chunk;
pub mod context;
pub mod embedding;
pub mod error;
pub mod keyword;
pub mod models;
pub mod search;
pub mod store;

pub use error::{RagError, Result};
pub use models::{ChunkKind, Corpus, Score, SearchResult, Topic};
