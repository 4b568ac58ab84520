//! Regrouping chunk records into logical papers
//!
//! The store holds one record per chunk. A paper is identified by its
//! `doc_id` metadata when present, and otherwise by stripping the chunk
//! index from the filename or from the chunk id.

use crate::store::{Metadata, StoredChunk};
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::OnceLock;

/// One paper, represented by the first chunk seen for it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Paper {
    /// Base filename (the document key)
    pub filename: String,
    /// Metadata of the representative chunk
    pub metadata: Metadata,
    /// Ids of every chunk of the paper, in store order
    pub chunk_ids: Vec<String>,
}

fn indexed_name() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?P<stem>.+?)_\d+(?P<ext>\.[^./\\]+)?$").expect("valid regex")
    })
}

/// Strip a `_<digits>` suffix before the extension, or from the end of an extension-less name
///
/// `paper_0.pdf` becomes `paper.pdf`; names without the suffix are returned unchanged.
pub fn base_filename(name: &str) -> String {
    if let Some(caps) = indexed_name().captures(name) {
        let stem = caps.name("stem").map_or("", |m| m.as_str());
        let ext = caps.name("ext").map_or("", |m| m.as_str());
        return format!("{}{}", stem, ext);
    }
    name.to_string()
}

/// Chunk id with its trailing `_<index>` removed
fn strip_chunk_index(id: &str) -> &str {
    match id.rsplit_once('_') {
        Some((prefix, index))
            if !prefix.is_empty() && !index.is_empty() && index.bytes().all(|b| b.is_ascii_digit()) =>
        {
            prefix
        }
        _ => id,
    }
}

fn string_field<'a>(metadata: &'a Metadata, key: &str) -> Option<&'a str> {
    match metadata.get(key) {
        Some(Value::String(s)) if !s.is_empty() => Some(s),
        _ => None,
    }
}

/// The key grouping a chunk record into its paper
pub fn document_key(record: &StoredChunk) -> String {
    key_for(&record.id, &record.metadata)
}

/// Document key from a chunk id and its metadata
pub fn key_for(chunk_id: &str, metadata: &Metadata) -> String {
    if let Some(doc_id) = string_field(metadata, "doc_id") {
        return doc_id.to_string();
    }
    if let Some(filename) = string_field(metadata, "filename") {
        return base_filename(filename);
    }
    strip_chunk_index(chunk_id).to_string()
}

/// Group chunk records into papers, keeping first-seen order
pub fn aggregate_papers(records: &[StoredChunk]) -> Vec<Paper> {
    let mut papers: Vec<Paper> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for record in records {
        let key = document_key(record);
        match index.get(&key) {
            Some(&i) => papers[i].chunk_ids.push(record.id.clone()),
            None => {
                index.insert(key.clone(), papers.len());
                papers.push(Paper {
                    filename: key,
                    metadata: record.metadata.clone(),
                    chunk_ids: vec![record.id.clone()],
                });
            }
        }
    }

    papers
}
