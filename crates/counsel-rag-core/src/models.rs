//! Core data models for the counseling knowledge corpus.
//!
//! A [`Corpus`] maps topic ids to [`Topic`] records and preserves the order
//! in which topics were loaded, since keyword search breaks score ties by
//! corpus order. Topics are split into [`DocumentChunk`]s for the vector
//! index; the index answers with [`Neighbor`]s, which the search step turns
//! into [`SearchResult`]s carrying the full topic payload.

use serde::de::{Deserializer, MapAccess, Visitor};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// One entry of the knowledge corpus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topic {
    /// Canonical explanatory text. Never empty.
    pub content: String,
    /// Literal phrases used by the keyword fallback matcher.
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Sample exchanges, indexed as separate vector chunks.
    #[serde(default)]
    pub examples: Vec<String>,
}

impl Topic {
    pub fn new(content: impl Into<String>, keywords: Vec<String>, examples: Vec<String>) -> Self {
        Self {
            content: content.into(),
            keywords,
            examples,
        }
    }
}

/// Ordered topic-id → [`Topic`] mapping.
///
/// Re-inserting an existing id replaces the record but keeps its original
/// position, the same way the corpus file's key order is kept on load.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Corpus {
    entries: Vec<(String, Topic)>,
    positions: HashMap<String, usize>,
}

impl Corpus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a corpus from its JSON storage form.
    ///
    /// Topics with empty `content` are skipped with a warning.
    pub fn from_json_str(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Insert or replace a topic, returning the previous record.
    pub fn insert(&mut self, id: impl Into<String>, topic: Topic) -> Option<Topic> {
        let id = id.into();
        match self.positions.get(&id) {
            Some(&pos) => Some(std::mem::replace(&mut self.entries[pos].1, topic)),
            None => {
                self.positions.insert(id.clone(), self.entries.len());
                self.entries.push((id, topic));
                None
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<&Topic> {
        self.positions.get(id).map(|&pos| &self.entries[pos].1)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.positions.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate topics in corpus order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Topic)> {
        self.entries.iter().map(|(id, t)| (id.as_str(), t))
    }
}

impl<'de> Deserialize<'de> for Corpus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct CorpusVisitor;

        impl<'de> Visitor<'de> for CorpusVisitor {
            type Value = Corpus;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of topic id to {content, keywords, examples}")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Corpus, A::Error> {
                let mut corpus = Corpus::new();
                while let Some((id, topic)) = map.next_entry::<String, Topic>()? {
                    if topic.content.trim().is_empty() {
                        tracing::warn!(topic = %id, "skipping topic with empty content");
                        continue;
                    }
                    corpus.insert(id, topic);
                }
                Ok(corpus)
            }
        }

        deserializer.deserialize_map(CorpusVisitor)
    }
}

/// Which part of a topic a vector chunk was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkKind {
    Content,
    Example,
}

impl ChunkKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkKind::Content => "content",
            ChunkKind::Example => "example",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "content" => Some(ChunkKind::Content),
            "example" => Some(ChunkKind::Example),
            _ => None,
        }
    }
}

/// Metadata stored alongside every vector chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub topic: String,
    pub kind: ChunkKind,
    /// Topic keywords joined with `,`.
    pub keywords: String,
}

/// A unit of text destined for the vector index.
///
/// Ids are `topic_<topic>` for content and `topic_<topic>_example_<i>` for
/// the i-th example; see [`crate::chunk`].
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentChunk {
    pub id: String,
    pub text: String,
    pub metadata: ChunkMetadata,
}

/// A nearest-neighbor hit returned by a [`crate::store::VectorIndex`].
#[derive(Debug, Clone, PartialEq)]
pub struct Neighbor {
    pub id: String,
    pub text: String,
    pub metadata: ChunkMetadata,
    /// Cosine distance: `1 - similarity`.
    pub distance: f32,
}

impl Neighbor {
    pub fn similarity(&self) -> f32 {
        1.0 - self.distance
    }
}

/// Relevance of a [`SearchResult`].
///
/// Serialized as a bare number, matching the JSON shape callers expect.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Score {
    /// Cosine similarity of the best matching chunk (vector mode).
    Similarity(f32),
    /// Number of keywords found in the query (keyword mode).
    KeywordHits(u32),
}

impl Score {
    pub fn value(&self) -> f64 {
        match *self {
            Score::Similarity(s) => s as f64,
            Score::KeywordHits(n) => n as f64,
        }
    }

    /// Scores of 1 or more read as exact matches and are not annotated.
    pub fn is_exact(&self) -> bool {
        self.value() >= 1.0
    }
}

/// One retrieved topic, carrying its full payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub topic: String,
    pub score: Score,
    pub content: String,
    pub examples: Vec<String>,
    pub keywords: Vec<String>,
}

impl SearchResult {
    pub fn from_topic(id: &str, topic: &Topic, score: Score) -> Self {
        Self {
            topic: id.to_string(),
            score,
            content: topic.content.clone(),
            examples: topic.examples.clone(),
            keywords: topic.keywords.clone(),
        }
    }
}
