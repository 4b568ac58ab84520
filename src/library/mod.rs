//! Library catalog over aggregated papers
//!
//! Read and edit operations on papers as a whole. Every edit is applied to
//! all chunks of the paper so the aggregation view stays consistent.

pub mod aggregate;

pub use aggregate::{aggregate_papers, base_filename, document_key, key_for, Paper};

use crate::embed::EmbeddingAdapter;
use crate::error::{Error, Result};
use crate::store::{Metadata, MetadataFilter, VectorStore};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Folder a paper belongs to when none was assigned
pub const DEFAULT_FOLDER: &str = "default";

/// Library-wide statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LibraryStats {
    pub total_papers: usize,
    pub categories: BTreeMap<String, usize>,
    pub tags: BTreeSet<String>,
    pub years: BTreeMap<String, usize>,
}

/// A search result
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub id: String,
    pub filename: String,
    pub score: f32,
    pub metadata: Metadata,
    /// Chunk text, truncated for display
    pub content: String,
}

/// Result of deleting a paper
#[derive(Debug, Clone, Serialize)]
pub struct DeletedPaper {
    pub filename: String,
    pub chunks: usize,
    /// Source PDF removed from the library directory, if any
    pub removed_file: Option<String>,
}

/// Tags of a paper; stored either as a list or as a JSON-encoded list
pub fn paper_tags(metadata: &Metadata) -> Vec<String> {
    match metadata.get("tags") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        Some(Value::String(raw)) => match serde_json::from_str::<Vec<String>>(raw) {
            Ok(tags) => tags,
            Err(_) => raw
                .split(',')
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect(),
        },
        _ => Vec::new(),
    }
}

fn field_as_string(metadata: &Metadata, key: &str) -> Option<String> {
    match metadata.get(key) {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

/// Folder of a paper, defaulting to [`DEFAULT_FOLDER`]
pub fn paper_folder(metadata: &Metadata) -> String {
    field_as_string(metadata, "folder_id").unwrap_or_else(|| DEFAULT_FOLDER.to_string())
}

/// Truncate to `max_chars` characters, marking the cut with `...`
pub fn truncate_preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte, _)) => format!("{}...", &text[..byte]),
        None => text.to_string(),
    }
}

pub struct Library {
    store: Arc<dyn VectorStore>,
    embedder: Arc<EmbeddingAdapter>,
    preview_chars: usize,
    files_dir: Option<PathBuf>,
}

impl Library {
    pub fn new(
        store: Arc<dyn VectorStore>,
        embedder: Arc<EmbeddingAdapter>,
        preview_chars: usize,
    ) -> Self {
        Self {
            store,
            embedder,
            preview_chars,
            files_dir: None,
        }
    }

    /// Directory holding the library's own copies of the PDFs
    ///
    /// Deletes only ever remove files below it.
    pub fn with_files_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.files_dir = Some(dir.into());
        self
    }

    // ===== Read Operations =====

    /// All papers in first-seen order
    pub async fn list_papers(&self) -> Result<Vec<Paper>> {
        let records = self.store.list().await?;
        Ok(aggregate_papers(&records))
    }

    pub async fn papers_by_tag(&self, tag: &str) -> Result<Vec<Paper>> {
        Ok(self
            .list_papers()
            .await?
            .into_iter()
            .filter(|p| paper_tags(&p.metadata).iter().any(|t| t == tag))
            .collect())
    }

    pub async fn papers_by_category(&self, category: &str) -> Result<Vec<Paper>> {
        Ok(self
            .list_papers()
            .await?
            .into_iter()
            .filter(|p| field_as_string(&p.metadata, "category").as_deref() == Some(category))
            .collect())
    }

    pub async fn papers_by_folder(&self, folder_id: &str) -> Result<Vec<Paper>> {
        Ok(self
            .list_papers()
            .await?
            .into_iter()
            .filter(|p| paper_folder(&p.metadata) == folder_id)
            .collect())
    }

    /// Paper counts by category and year, plus the set of tags in use
    pub async fn stats(&self) -> Result<LibraryStats> {
        let papers = self.list_papers().await?;
        let mut stats = LibraryStats {
            total_papers: papers.len(),
            ..Default::default()
        };

        for paper in &papers {
            if let Some(category) = field_as_string(&paper.metadata, "category") {
                *stats.categories.entry(category).or_default() += 1;
            }
            if let Some(year) = field_as_string(&paper.metadata, "year") {
                *stats.years.entry(year).or_default() += 1;
            }
            stats.tags.extend(paper_tags(&paper.metadata));
        }

        Ok(stats)
    }

    /// Semantic search over chunks
    pub async fn search(
        &self,
        query: &str,
        limit: usize,
        filter: Option<MetadataFilter>,
    ) -> Result<Vec<SearchHit>> {
        let embedding = self.embedder.embed(query).await?;
        let results = self.store.query(embedding, limit, filter).await?;
        debug!(query, hits = results.len(), "Search completed");

        Ok(results
            .into_iter()
            .map(|hit| {
                let filename = key_for(&hit.id, &hit.metadata);
                SearchHit {
                    content: truncate_preview(&hit.text, self.preview_chars),
                    id: hit.id,
                    filename,
                    score: hit.score,
                    metadata: hit.metadata,
                }
            })
            .collect())
    }

    async fn find_paper(&self, filename: &str) -> Result<Paper> {
        self.list_papers()
            .await?
            .into_iter()
            .find(|p| p.filename == filename)
            .ok_or_else(|| Error::PaperNotFound(filename.to_string()))
    }

    pub async fn paper_metadata(&self, filename: &str) -> Result<Metadata> {
        Ok(self.find_paper(filename).await?.metadata)
    }

    // ===== Edit Operations =====

    /// Merge `patch` over the paper's metadata and write it to every chunk
    ///
    /// `doc_id` is kept as stored so the paper keeps its identity.
    pub async fn update_metadata(&self, filename: &str, patch: Metadata) -> Result<Paper> {
        let mut paper = self.find_paper(filename).await?;

        let doc_id = paper.metadata.get("doc_id").cloned();
        for (key, value) in patch {
            paper.metadata.insert(key, value);
        }
        match doc_id {
            Some(id) => {
                paper.metadata.insert("doc_id".to_string(), id);
            }
            None => {
                paper.metadata.remove("doc_id");
            }
        }

        let metadatas = vec![paper.metadata.clone(); paper.chunk_ids.len()];
        self.store
            .update_metadata(&paper.chunk_ids, metadatas)
            .await?;

        info!(
            filename,
            chunks = paper.chunk_ids.len(),
            "Updated paper metadata"
        );
        Ok(paper)
    }

    pub async fn move_paper(&self, filename: &str, folder_id: &str) -> Result<Paper> {
        let mut patch = Metadata::new();
        patch.insert("folder_id".to_string(), Value::String(folder_id.to_string()));
        self.update_metadata(filename, patch).await
    }

    /// Path of the PDF a paper was ingested from
    pub async fn paper_file(&self, filename: &str) -> Result<PathBuf> {
        let metadata = self.paper_metadata(filename).await?;
        let source = field_as_string(&metadata, "source")
            .map(PathBuf::from)
            .ok_or_else(|| Error::InvalidPath(format!("{} has no source file", filename)))?;

        if !tokio::fs::try_exists(&source).await? {
            return Err(Error::InvalidPath(format!(
                "{} no longer exists",
                source.display()
            )));
        }
        Ok(source)
    }

    /// Delete every chunk of a paper
    ///
    /// With `remove_file`, the source PDF is removed as well when it lives
    /// inside the files directory. Files elsewhere are left untouched.
    pub async fn delete_paper(&self, filename: &str, remove_file: bool) -> Result<DeletedPaper> {
        let paper = self.find_paper(filename).await?;
        self.store.delete_by_ids(&paper.chunk_ids).await?;
        info!(filename, chunks = paper.chunk_ids.len(), "Deleted paper");

        let removed_file = if remove_file {
            self.remove_source(&paper.metadata).await?
        } else {
            None
        };

        Ok(DeletedPaper {
            filename: filename.to_string(),
            chunks: paper.chunk_ids.len(),
            removed_file,
        })
    }

    async fn remove_source(&self, metadata: &Metadata) -> Result<Option<String>> {
        let (Some(dir), Some(source)) = (&self.files_dir, field_as_string(metadata, "source"))
        else {
            return Ok(None);
        };

        let source = Path::new(&source);
        let (Ok(dir), Ok(file)) = (
            tokio::fs::canonicalize(dir).await,
            tokio::fs::canonicalize(source).await,
        ) else {
            debug!(source = %source.display(), "Source file already gone");
            return Ok(None);
        };

        if !file.starts_with(&dir) {
            warn!(source = %file.display(), "Source file is outside the library directory, keeping it");
            return Ok(None);
        }

        match tokio::fs::remove_file(&file).await {
            Ok(()) => {
                info!(source = %file.display(), "Removed source file");
                Ok(Some(file.display().to_string()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
