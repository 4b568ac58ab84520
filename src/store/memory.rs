//! In-memory [`VectorStore`] for tests and offline runs
//!
//! Records sit in a `Vec` behind `std::sync::RwLock`, in write order.
//! Queries are brute-force cosine similarity over every stored vector.

use super::{ChunkRecord, Metadata, MetadataFilter, ScoredChunk, StoredChunk, VectorStore};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<Vec<ChunkRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.read()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.read()?.is_empty())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Vec<ChunkRecord>>> {
        self.records
            .read()
            .map_err(|_| Error::Store("memory store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Vec<ChunkRecord>>> {
        self.records
            .write()
            .map_err(|_| Error::Store("memory store lock poisoned".to_string()))
    }
}

fn cosine_sim(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if mag_a < f32::EPSILON || mag_b < f32::EPSILON {
        0.0
    } else {
        dot / (mag_a * mag_b)
    }
}

fn to_stored(record: &ChunkRecord) -> StoredChunk {
    StoredChunk {
        id: record.id.clone(),
        text: record.text.clone(),
        metadata: record.metadata.clone(),
    }
}

#[async_trait]
impl VectorStore for MemoryStore {
    async fn add_chunks(&self, chunks: Vec<ChunkRecord>) -> Result<()> {
        let mut records = self.write()?;
        for chunk in chunks {
            match records.iter_mut().find(|r| r.id == chunk.id) {
                Some(existing) => *existing = chunk,
                None => records.push(chunk),
            }
        }
        Ok(())
    }

    async fn get_by_ids(&self, ids: &[String]) -> Result<Vec<StoredChunk>> {
        let records = self.read()?;
        Ok(ids
            .iter()
            .filter_map(|id| records.iter().find(|r| r.id == *id))
            .map(to_stored)
            .collect())
    }

    async fn update_metadata(&self, ids: &[String], metadatas: Vec<Metadata>) -> Result<()> {
        if ids.len() != metadatas.len() {
            return Err(Error::Store(format!(
                "update_metadata got {} ids but {} metadata objects",
                ids.len(),
                metadatas.len()
            )));
        }

        let mut records = self.write()?;
        for (id, metadata) in ids.iter().zip(metadatas) {
            if let Some(record) = records.iter_mut().find(|r| r.id == *id) {
                record.metadata = metadata;
            }
        }
        Ok(())
    }

    async fn delete_by_ids(&self, ids: &[String]) -> Result<()> {
        self.write()?.retain(|r| !ids.contains(&r.id));
        Ok(())
    }

    async fn query(
        &self,
        embedding: Vec<f32>,
        k: usize,
        filter: Option<MetadataFilter>,
    ) -> Result<Vec<ScoredChunk>> {
        let records = self.read()?;
        let mut scored: Vec<ScoredChunk> = records
            .iter()
            .filter(|r| filter.as_ref().map_or(true, |f| f.matches(&r.metadata)))
            .map(|r| ScoredChunk {
                id: r.id.clone(),
                text: r.text.clone(),
                metadata: r.metadata.clone(),
                score: cosine_sim(&embedding, &r.embedding),
            })
            .collect();

        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(k);
        Ok(scored)
    }

    async fn list(&self) -> Result<Vec<StoredChunk>> {
        Ok(self.read()?.iter().map(to_stored).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(id: &str, embedding: Vec<f32>, category: &str) -> ChunkRecord {
        ChunkRecord {
            id: id.to_string(),
            text: format!("text of {id}"),
            embedding,
            metadata: json!({"filename": "x.pdf", "category": category})
                .as_object()
                .cloned()
                .unwrap(),
        }
    }

    #[tokio::test]
    async fn test_add_keeps_write_order_and_overwrites() {
        let store = MemoryStore::new();
        store
            .add_chunks(vec![
                record("b_0", vec![1.0, 0.0], "ml"),
                record("a_0", vec![0.0, 1.0], "ml"),
            ])
            .await
            .unwrap();
        store
            .add_chunks(vec![record("b_0", vec![0.5, 0.5], "physics")])
            .await
            .unwrap();

        let listed = store.list().await.unwrap();
        let ids: Vec<&str> = listed.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["b_0", "a_0"]);
        assert_eq!(listed[0].metadata["category"], "physics");
    }

    #[tokio::test]
    async fn test_get_update_delete() {
        let store = MemoryStore::new();
        store
            .add_chunks(vec![
                record("p_0", vec![1.0, 0.0], "ml"),
                record("p_1", vec![0.0, 1.0], "ml"),
            ])
            .await
            .unwrap();

        let ids = vec!["p_1".to_string(), "missing".to_string(), "p_0".to_string()];
        let got = store.get_by_ids(&ids).await.unwrap();
        assert_eq!(got.len(), 2);
        assert_eq!(got[0].id, "p_1");

        let new_meta = json!({"filename": "x.pdf", "category": "cv"})
            .as_object()
            .cloned()
            .unwrap();
        store
            .update_metadata(&["p_0".to_string()], vec![new_meta])
            .await
            .unwrap();
        let got = store.get_by_ids(&["p_0".to_string()]).await.unwrap();
        assert_eq!(got[0].metadata["category"], "cv");

        store
            .delete_by_ids(&["p_0".to_string(), "nope".to_string()])
            .await
            .unwrap();
        assert_eq!(store.len().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_query_ranks_by_cosine_and_filters() {
        let store = MemoryStore::new();
        store
            .add_chunks(vec![
                record("a_0", vec![1.0, 0.0], "ml"),
                record("b_0", vec![0.7, 0.7], "ml"),
                record("c_0", vec![0.0, 1.0], "physics"),
            ])
            .await
            .unwrap();

        let hits = store.query(vec![1.0, 0.1], 2, None).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "a_0");
        assert_eq!(hits[1].id, "b_0");
        assert!(hits[0].score >= hits[1].score);

        let filter = MetadataFilter::new().equals("category", "physics");
        let hits = store.query(vec![1.0, 0.1], 5, Some(filter)).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "c_0");
    }
}
