//! PDF text extraction
//!
//! Extraction runs on the blocking pool. A parser panic surfaces as a
//! JoinError there and is reported as an extraction failure for that file.

use crate::error::{Error, Result};
use async_trait::async_trait;
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;
use tracing::debug;

/// Turns a source file into plain text
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract(&self, path: &Path) -> Result<String>;
}

/// Extractor for PDF files backed by `pdf-extract`
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfExtractor;

impl PdfExtractor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TextExtractor for PdfExtractor {
    async fn extract(&self, path: &Path) -> Result<String> {
        let shown = path.display().to_string();
        let bytes = tokio::fs::read(path).await.map_err(|e| Error::Extraction {
            path: shown.clone(),
            reason: e.to_string(),
        })?;

        let raw = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
            .await
            .map_err(|e| Error::Extraction {
                path: shown.clone(),
                reason: if e.is_panic() {
                    "PDF parser panicked".to_string()
                } else {
                    e.to_string()
                },
            })?
            .map_err(|e| Error::Extraction {
                path: shown.clone(),
                reason: e.to_string(),
            })?;

        let text = clean_text(&raw);
        debug!(path = %shown, chars = text.chars().count(), "Extracted PDF text");
        Ok(text)
    }
}

fn control_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[\x00-\x08\x0B\x0C\x0E-\x1F\x7F]").expect("valid regex"))
}

/// Strip control characters (keeping tab, newline and carriage return) and trim
pub fn clean_text(text: &str) -> String {
    control_chars().replace_all(text, "").trim().to_string()
}

/// True when the path has a `.pdf` extension, compared case-insensitively
pub fn is_pdf(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false)
}
