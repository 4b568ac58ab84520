//! Payload schema for Qdrant points

use super::{ChunkRecord, Metadata, StoredChunk};
use qdrant_client::qdrant::value::Kind;
use qdrant_client::qdrant::{ListValue, PointId, PointStruct, Struct, Value as QdrantValue};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

/// Stable Qdrant point id for a chunk id
///
/// Qdrant only accepts UUIDs or integers as point ids.
pub fn point_id_for(chunk_id: &str) -> Uuid {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, chunk_id.as_bytes())
}

/// Payload stored with each chunk in Qdrant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkPayload {
    /// Chunk id (`{base filename}_{index}`)
    pub chunk_id: String,

    /// Chunk text
    pub document: String,

    /// Document metadata, identical across a document's chunks
    #[serde(default)]
    pub metadata: Metadata,

    /// When the batch holding this chunk was written
    #[serde(default)]
    pub ingested_at: String,

    /// Position within that batch
    #[serde(default)]
    pub batch_position: i64,
}

impl ChunkPayload {
    pub fn from_record(record: &ChunkRecord, ingested_at: &str, batch_position: usize) -> Self {
        Self {
            chunk_id: record.id.clone(),
            document: record.text.clone(),
            metadata: record.metadata.clone(),
            ingested_at: ingested_at.to_string(),
            batch_position: batch_position as i64,
        }
    }

    /// Convert to Qdrant payload format
    pub fn to_qdrant_payload(&self) -> HashMap<String, QdrantValue> {
        let mut map = HashMap::new();

        map.insert("chunk_id".to_string(), string_to_qdrant(&self.chunk_id));
        map.insert("document".to_string(), string_to_qdrant(&self.document));
        map.insert(
            "metadata".to_string(),
            json_to_qdrant_value(Value::Object(self.metadata.clone())),
        );
        map.insert("ingested_at".to_string(), string_to_qdrant(&self.ingested_at));
        map.insert("batch_position".to_string(), int_to_qdrant(self.batch_position));

        map
    }

    /// Parse a payload read back from Qdrant
    pub fn from_qdrant_payload(payload: HashMap<String, QdrantValue>) -> Option<Self> {
        let map: serde_json::Map<String, Value> = payload
            .into_iter()
            .map(|(k, v)| (k, json_from_qdrant_value(v)))
            .collect();
        serde_json::from_value(Value::Object(map)).ok()
    }

    pub fn into_stored(self) -> StoredChunk {
        StoredChunk {
            id: self.chunk_id,
            text: self.document,
            metadata: self.metadata,
        }
    }
}

/// Build the Qdrant point for a chunk record
pub fn to_point_struct(record: ChunkRecord, ingested_at: &str, batch_position: usize) -> PointStruct {
    let payload = ChunkPayload::from_record(&record, ingested_at, batch_position);
    PointStruct::new(
        point_id_for(&record.id).to_string(),
        record.embedding,
        payload.to_qdrant_payload(),
    )
}

pub fn point_ids_for(chunk_ids: &[String]) -> Vec<PointId> {
    chunk_ids
        .iter()
        .map(|id| PointId::from(point_id_for(id).to_string()))
        .collect()
}

fn string_to_qdrant(s: &str) -> QdrantValue {
    QdrantValue {
        kind: Some(Kind::StringValue(s.to_string())),
    }
}

fn int_to_qdrant(i: i64) -> QdrantValue {
    QdrantValue {
        kind: Some(Kind::IntegerValue(i)),
    }
}

/// Convert serde_json Value to Qdrant value
pub fn json_to_qdrant_value(v: Value) -> QdrantValue {
    let kind = match v {
        Value::Null => Kind::NullValue(0),
        Value::Bool(b) => Kind::BoolValue(b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Kind::IntegerValue(i),
            None => Kind::DoubleValue(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => Kind::StringValue(s),
        Value::Array(items) => Kind::ListValue(ListValue {
            values: items.into_iter().map(json_to_qdrant_value).collect(),
        }),
        Value::Object(fields) => Kind::StructValue(Struct {
            fields: fields
                .into_iter()
                .map(|(k, v)| (k, json_to_qdrant_value(v)))
                .collect(),
        }),
    };
    QdrantValue { kind: Some(kind) }
}

/// Convert Qdrant value to serde_json Value
pub fn json_from_qdrant_value(v: QdrantValue) -> Value {
    match v.kind {
        Some(Kind::NullValue(_)) => Value::Null,
        Some(Kind::BoolValue(b)) => Value::Bool(b),
        Some(Kind::IntegerValue(i)) => Value::Number(i.into()),
        Some(Kind::DoubleValue(d)) => serde_json::Number::from_f64(d)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        Some(Kind::StringValue(s)) => Value::String(s),
        Some(Kind::ListValue(list)) => Value::Array(
            list.values
                .into_iter()
                .map(json_from_qdrant_value)
                .collect(),
        ),
        Some(Kind::StructValue(s)) => Value::Object(
            s.fields
                .into_iter()
                .map(|(k, v)| (k, json_from_qdrant_value(v)))
                .collect(),
        ),
        None => Value::Null,
    }
}
