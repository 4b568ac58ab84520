//! Qdrant-backed [`VectorStore`]

use super::{
    point_ids_for, to_point_struct, ChunkPayload, ChunkRecord, Metadata, MetadataFilter,
    ScoredChunk, StoredChunk, VectorStore,
};
use crate::config::Config;
use crate::error::{Error, Result};
use async_trait::async_trait;
use chrono::Utc;
use qdrant_client::qdrant::{
    Condition, CreateCollectionBuilder, Range, DeletePointsBuilder, Distance, Filter,
    GetPointsBuilder, PointStruct, PointsIdsList, ScrollPointsBuilder, SearchPointsBuilder,
    SetPayloadPointsBuilder, UpsertPointsBuilder, VectorParamsBuilder,
};
use qdrant_client::{Payload, Qdrant};
use serde_json::json;
use tracing::{debug, info, warn};

/// Information about a Qdrant collection
#[derive(Debug, Clone)]
pub struct CollectionInfo {
    pub points_count: u64,
    pub status: String,
}

/// Qdrant store handle
pub struct QdrantStore {
    client: Qdrant,
    collection: String,
    dimension: usize,
}

impl QdrantStore {
    /// Connect to Qdrant using config
    pub async fn connect(config: &Config) -> Result<Self> {
        let api_key = config.qdrant_api_key();
        Self::new(
            &config.qdrant_url,
            api_key,
            &config.collection_name,
            config.embedding.resolved_dimension(),
        )
        .await
    }

    /// Create a new store connection directly with URL and collection name
    pub async fn new(
        url: &str,
        api_key: Option<String>,
        collection: &str,
        dimension: usize,
    ) -> Result<Self> {
        debug!("Connecting to Qdrant at {}", url);

        let mut builder = Qdrant::from_url(url).skip_compatibility_check();
        if let Some(key) = api_key {
            builder = builder.api_key(key);
        }
        let client = builder.build().map_err(|e| Error::Qdrant(e.to_string()))?;

        Ok(Self {
            client,
            collection: collection.to_string(),
            dimension,
        })
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Ensure the collection exists
    pub async fn ensure_collection(&self) -> Result<()> {
        if self.client.collection_exists(&self.collection).await? {
            debug!("Collection {} already exists", self.collection);
            return Ok(());
        }

        info!(
            "Creating collection {} with dimension {}",
            self.collection, self.dimension
        );

        self.client
            .create_collection(
                CreateCollectionBuilder::new(&self.collection).vectors_config(
                    VectorParamsBuilder::new(self.dimension as u64, Distance::Cosine),
                ),
            )
            .await?;

        info!("Collection {} created successfully", self.collection);
        Ok(())
    }

    /// Get collection info (point count, etc)
    pub async fn get_collection_info(&self) -> Result<Option<CollectionInfo>> {
        if !self.client.collection_exists(&self.collection).await? {
            return Ok(None);
        }

        let info = self.client.collection_info(&self.collection).await?;
        Ok(info.result.map(|result| CollectionInfo {
            points_count: result.points_count.unwrap_or(0),
            status: format!("{:?}", result.status()),
        }))
    }

    fn check_dimensions(&self, chunks: &[ChunkRecord]) -> Result<()> {
        if let Some(mismatch) = chunks.iter().find(|c| c.embedding.len() != self.dimension) {
            return Err(Error::Qdrant(format!(
                "Vector dimension mismatch for collection '{}': expected {}, got {} (chunk {})",
                self.collection,
                self.dimension,
                mismatch.embedding.len(),
                mismatch.id
            )));
        }
        Ok(())
    }
}

/// Condition matching `value` against a payload field stored as a string, number or bool
///
/// Qdrant matches keywords, integers and booleans by type, so a value that
/// parses as a number or bool also matches the typed payload.
fn equals_condition(field: String, value: &str) -> Condition {
    let mut alternatives = vec![Condition::matches(field.clone(), value.to_string())];

    if let Ok(n) = value.parse::<i64>() {
        alternatives.push(Condition::matches(field.clone(), n));
    } else if let Ok(x) = value.parse::<f64>() {
        alternatives.push(Condition::range(
            field.clone(),
            Range {
                gte: Some(x),
                lte: Some(x),
                ..Default::default()
            },
        ));
    }
    if let Ok(b) = value.parse::<bool>() {
        alternatives.push(Condition::matches(field, b));
    }

    if alternatives.len() == 1 {
        alternatives.remove(0)
    } else {
        Filter::should(alternatives).into()
    }
}

/// Payload filter on the nested `metadata` object
fn to_qdrant_filter(filter: &MetadataFilter) -> Option<Filter> {
    if filter.is_empty() {
        return None;
    }

    let must: Vec<Condition> = filter
        .equals
        .iter()
        .map(|(key, value)| equals_condition(format!("metadata.{}", key), value))
        .collect();

    Some(Filter {
        must,
        should: vec![],
        must_not: vec![],
        min_should: None,
    })
}

fn stored_from_payload(
    payload: std::collections::HashMap<String, qdrant_client::qdrant::Value>,
) -> Option<ChunkPayload> {
    let parsed = ChunkPayload::from_qdrant_payload(payload);
    if parsed.is_none() {
        warn!("Skipping Qdrant point without a chunk payload");
    }
    parsed
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn add_chunks(&self, chunks: Vec<ChunkRecord>) -> Result<()> {
        if chunks.is_empty() {
            return Ok(());
        }
        self.check_dimensions(&chunks)?;

        debug!(
            "Upserting {} points to collection {}",
            chunks.len(),
            self.collection
        );

        let ingested_at = Utc::now().to_rfc3339();
        let points: Vec<PointStruct> = chunks
            .into_iter()
            .enumerate()
            .map(|(i, c)| to_point_struct(c, &ingested_at, i))
            .collect();

        self.client
            .upsert_points(UpsertPointsBuilder::new(&self.collection, points).wait(true))
            .await?;

        Ok(())
    }

    async fn get_by_ids(&self, ids: &[String]) -> Result<Vec<StoredChunk>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let response = self
            .client
            .get_points(
                GetPointsBuilder::new(&self.collection, point_ids_for(ids))
                    .with_payload(true)
                    .with_vectors(false),
            )
            .await?;

        let mut found: Vec<StoredChunk> = response
            .result
            .into_iter()
            .filter_map(|p| stored_from_payload(p.payload))
            .map(ChunkPayload::into_stored)
            .collect();

        // Answer in request order
        found.sort_by_key(|c| ids.iter().position(|id| *id == c.id));
        Ok(found)
    }

    async fn update_metadata(&self, ids: &[String], metadatas: Vec<Metadata>) -> Result<()> {
        if ids.len() != metadatas.len() {
            return Err(Error::Store(format!(
                "update_metadata got {} ids but {} metadata objects",
                ids.len(),
                metadatas.len()
            )));
        }

        for (id, metadata) in ids.iter().zip(metadatas) {
            let payload = Payload::try_from(json!({ "metadata": metadata }))?;
            self.client
                .set_payload(
                    SetPayloadPointsBuilder::new(&self.collection, payload)
                        .points_selector(PointsIdsList {
                            ids: point_ids_for(std::slice::from_ref(id)),
                        })
                        .wait(true),
                )
                .await?;
        }

        Ok(())
    }

    async fn delete_by_ids(&self, ids: &[String]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }

        debug!(
            "Deleting {} points from collection {}",
            ids.len(),
            self.collection
        );

        self.client
            .delete_points(
                DeletePointsBuilder::new(&self.collection)
                    .points(point_ids_for(ids))
                    .wait(true),
            )
            .await?;

        Ok(())
    }

    async fn query(
        &self,
        embedding: Vec<f32>,
        k: usize,
        filter: Option<MetadataFilter>,
    ) -> Result<Vec<ScoredChunk>> {
        debug!("Searching collection {} with limit {}", self.collection, k);

        let mut search_builder =
            SearchPointsBuilder::new(&self.collection, embedding, k as u64).with_payload(true);

        if let Some(qdrant_filter) = filter.as_ref().and_then(to_qdrant_filter) {
            search_builder = search_builder.filter(qdrant_filter);
        }

        let response = self.client.search_points(search_builder).await?;

        let results = response
            .result
            .into_iter()
            .filter_map(|p| {
                let score = p.score;
                stored_from_payload(p.payload).map(|payload| ScoredChunk {
                    id: payload.chunk_id,
                    text: payload.document,
                    metadata: payload.metadata,
                    score,
                })
            })
            .collect();

        Ok(results)
    }

    async fn list(&self) -> Result<Vec<StoredChunk>> {
        let mut payloads = Vec::new();
        let mut offset = None;
        let batch_size = 1000u32;

        loop {
            let mut scroll_builder = ScrollPointsBuilder::new(&self.collection)
                .limit(batch_size)
                .with_payload(true)
                .with_vectors(false);

            if let Some(o) = offset.take() {
                scroll_builder = scroll_builder.offset(o);
            }

            let response = self.client.scroll(scroll_builder).await?;
            if response.result.is_empty() {
                break;
            }

            payloads.extend(
                response
                    .result
                    .into_iter()
                    .filter_map(|p| stored_from_payload(p.payload)),
            );

            offset = response.next_page_offset;
            if offset.is_none() {
                break;
            }
        }

        // Scroll pages come back in point-id order; restore write order
        payloads.sort_by(|a, b| {
            a.ingested_at
                .cmp(&b.ingested_at)
                .then(a.batch_position.cmp(&b.batch_position))
        });

        Ok(payloads.into_iter().map(ChunkPayload::into_stored).collect())
    }
}
