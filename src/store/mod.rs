//! Vector store integration
//!
//! Chunk records (id, text, embedding, metadata) live in an external vector
//! database. This module defines the [`VectorStore`] seam the pipeline and the
//! library catalog talk to, with two implementations:
//! - [`QdrantStore`] for the real Qdrant collection
//! - [`MemoryStore`] for tests and offline use

mod memory;
mod payload;
mod qdrant;

pub use memory::*;
pub use payload::*;
pub use qdrant::*;

use crate::error::Result;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};

/// Metadata object attached to every chunk of a document
pub type Metadata = Map<String, Value>;

/// A chunk ready to be written to the store
#[derive(Debug, Clone)]
pub struct ChunkRecord {
    /// `{base filename}_{chunk index}`
    pub id: String,
    pub text: String,
    pub embedding: Vec<f32>,
    pub metadata: Metadata,
}

/// A chunk read back from the store (without its vector)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredChunk {
    pub id: String,
    pub text: String,
    pub metadata: Metadata,
}

/// A nearest-neighbour hit
#[derive(Debug, Clone, Serialize)]
pub struct ScoredChunk {
    pub id: String,
    pub text: String,
    pub metadata: Metadata,
    /// Cosine similarity, higher is closer
    pub score: f32,
}

/// Exact-match conditions on metadata fields; all must hold
#[derive(Debug, Clone, Default)]
pub struct MetadataFilter {
    pub equals: Vec<(String, String)>,
}

impl MetadataFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn equals(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.equals.push((key.into(), value.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.equals.is_empty()
    }

    /// Check a metadata object against the filter
    pub fn matches(&self, metadata: &Metadata) -> bool {
        self.equals.iter().all(|(key, expected)| match metadata.get(key) {
            Some(Value::String(s)) => s == expected,
            Some(Value::Number(n)) => n.to_string() == *expected,
            Some(Value::Bool(b)) => b.to_string() == *expected,
            _ => false,
        })
    }
}

/// Operations the pipeline and the library need from a vector store
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert or overwrite chunks in one batch
    async fn add_chunks(&self, chunks: Vec<ChunkRecord>) -> Result<()>;

    /// Fetch chunks by id; unknown ids are skipped
    async fn get_by_ids(&self, ids: &[String]) -> Result<Vec<StoredChunk>>;

    /// Replace the metadata of each chunk in `ids` with the matching entry of `metadatas`
    async fn update_metadata(&self, ids: &[String], metadatas: Vec<Metadata>) -> Result<()>;

    /// Delete chunks by id; unknown ids are ignored
    async fn delete_by_ids(&self, ids: &[String]) -> Result<()>;

    /// Nearest chunks to `embedding`, best first
    async fn query(
        &self,
        embedding: Vec<f32>,
        k: usize,
        filter: Option<MetadataFilter>,
    ) -> Result<Vec<ScoredChunk>>;

    /// Every stored chunk, in store order
    async fn list(&self) -> Result<Vec<StoredChunk>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn meta(value: Value) -> Metadata {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_metadata_filter_matches() {
        let m = meta(json!({"category": "ml", "year": 2021, "folder_id": "default"}));

        assert!(MetadataFilter::new().matches(&m));
        assert!(MetadataFilter::new().equals("category", "ml").matches(&m));
        assert!(MetadataFilter::new()
            .equals("category", "ml")
            .equals("year", "2021")
            .matches(&m));
        assert!(!MetadataFilter::new().equals("category", "physics").matches(&m));
        assert!(!MetadataFilter::new().equals("missing", "x").matches(&m));
    }
}
