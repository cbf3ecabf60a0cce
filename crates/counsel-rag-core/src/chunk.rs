//! Splitting topics into vector-index chunks.
//!
//! Every topic yields one content chunk plus one chunk per example. All
//! chunks of a topic share the topic id and keyword list in their
//! metadata, so any matching chunk can be mapped back to the full topic.
//!
//! Chunk ids are stable for a given topic/example pair, which lets the
//! index upsert instead of duplicating on re-ingestion:
//!
//! ```rust
//! use counsel_rag_core::chunk::{content_chunk_id, example_chunk_id};
//!
//! assert_eq!(content_chunk_id("breakup"), "topic_breakup");
//! assert_eq!(example_chunk_id("breakup", 2), "topic_breakup_example_2");
//! ```

use crate::models::{ChunkKind, ChunkMetadata, Corpus, DocumentChunk, Topic};

pub fn content_chunk_id(topic: &str) -> String {
    format!("topic_{}", topic)
}

pub fn example_chunk_id(topic: &str, index: usize) -> String {
    format!("topic_{}_example_{}", topic, index)
}

fn metadata(topic_id: &str, topic: &Topic, kind: ChunkKind) -> ChunkMetadata {
    ChunkMetadata {
        topic: topic_id.to_string(),
        kind,
        keywords: topic.keywords.join(","),
    }
}

/// The content chunk for a single topic.
pub fn content_chunk(topic_id: &str, topic: &Topic) -> DocumentChunk {
    DocumentChunk {
        id: content_chunk_id(topic_id),
        text: topic.content.clone(),
        metadata: metadata(topic_id, topic, ChunkKind::Content),
    }
}

/// Content chunk followed by one chunk per example, in example order.
pub fn topic_chunks(topic_id: &str, topic: &Topic) -> Vec<DocumentChunk> {
    let mut chunks = Vec::with_capacity(1 + topic.examples.len());
    chunks.push(content_chunk(topic_id, topic));
    for (i, example) in topic.examples.iter().enumerate() {
        chunks.push(DocumentChunk {
            id: example_chunk_id(topic_id, i),
            text: example.clone(),
            metadata: metadata(topic_id, topic, ChunkKind::Example),
        });
    }
    chunks
}

/// All chunks of the corpus, in corpus order.
pub fn corpus_chunks(corpus: &Corpus) -> Vec<DocumentChunk> {
    corpus
        .iter()
        .flat_map(|(id, topic)| topic_chunks(id, topic))
        .collect()
}
