//! Embedding generation
//!
//! This module provides:
//! - A trait for embedding providers
//! - An OpenAI-compatible HTTP provider
//! - `EmbeddingAdapter`, which spaces calls and embeds a document's chunks in order

mod openai;
mod rate_limit;

pub use openai::*;
pub use rate_limit::*;

use crate::config::EmbeddingConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Trait for embedding providers
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Get the embedding dimension
    fn dimension(&self) -> usize;

    /// Get the model name
    fn model_name(&self) -> &str;
}

/// Create an embedder based on configuration
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    let embedder = OpenAiEmbedder::new(config)?;
    Ok(Arc::new(embedder))
}

/// Rate-limited front for an [`Embedder`]
pub struct EmbeddingAdapter {
    embedder: Arc<dyn Embedder>,
    limiter: Option<CallRateLimiter>,
}

impl EmbeddingAdapter {
    pub fn new(embedder: Arc<dyn Embedder>, request_delay: Duration) -> Self {
        Self {
            embedder,
            limiter: CallRateLimiter::new(request_delay),
        }
    }

    /// Build the adapter described by the embedding configuration
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self> {
        Ok(Self::new(create_embedder(config)?, config.request_delay()))
    }

    /// Embed one text, waiting out the inter-call delay first
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if let Some(limiter) = &self.limiter {
            limiter.wait().await;
        }
        self.embedder.embed(text).await
    }

    /// Embed chunks sequentially, in order, stopping at the first failure
    pub async fn embed_chunks(&self, chunks: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(chunks.len());

        for (i, chunk) in chunks.iter().enumerate() {
            let embedding = self.embed(chunk).await.map_err(|e| match e {
                Error::Embedding(msg) => Error::Embedding(format!(
                    "chunk {} of {}: {}",
                    i + 1,
                    chunks.len(),
                    msg
                )),
                other => other,
            })?;
            debug!(chunk = i, total = chunks.len(), "Embedded chunk");
            embeddings.push(embedding);
        }

        Ok(embeddings)
    }

    pub fn dimension(&self) -> usize {
        self.embedder.dimension()
    }

    pub fn model_name(&self) -> &str {
        self.embedder.model_name()
    }
}
