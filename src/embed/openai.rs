//! OpenAI-compatible `/embeddings` client

use super::Embedder;
use crate::config::EmbeddingConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

#[derive(Debug, Clone, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum EmbeddingResponse {
    Data { data: Vec<EmbeddingData> },
    Embeddings { embeddings: Vec<Vec<f32>> },
}

#[derive(Debug, Clone, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

impl EmbeddingResponse {
    fn into_first(self) -> Option<Vec<f32>> {
        match self {
            EmbeddingResponse::Data { data } => data.into_iter().next().map(|d| d.embedding),
            EmbeddingResponse::Embeddings { embeddings } => embeddings.into_iter().next(),
        }
    }
}

/// Whether a failed attempt is worth repeating
enum Attempt {
    Retry(Error),
    Fatal(Error),
}

pub struct OpenAiEmbedder {
    client: Client,
    endpoint: Url,
    api_key: Option<String>,
    model: String,
    dimension: usize,
    retries: usize,
}

impl OpenAiEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        // Url::join drops the last path segment unless the base ends in '/'
        let mut base = config.base_url.trim().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let endpoint = Url::parse(&base)?
            .join("embeddings")
            .map_err(|e| Error::Config(format!("Invalid embedding API URL: {}", e)))?;

        let api_key = config.api_key();
        if api_key.is_none() {
            warn!(
                "{} is not set; embedding requests will be sent without credentials",
                config.api_key_env
            );
        }

        Ok(Self {
            client,
            endpoint,
            api_key,
            model: config.model.clone(),
            dimension: config.resolved_dimension(),
            retries: config.max_retries,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn validate_dimension(&self, embedding: &[f32]) -> Result<()> {
        if embedding.len() != self.dimension {
            return Err(Error::Embedding(format!(
                "Embedding dimension mismatch for model '{}': expected {}, got {}",
                self.model,
                self.dimension,
                embedding.len()
            )));
        }
        Ok(())
    }

    async fn attempt(&self, text: &str) -> std::result::Result<Vec<f32>, Attempt> {
        let mut request = self.client.post(self.endpoint.clone()).json(&EmbeddingRequest {
            model: &self.model,
            input: text,
        });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) if e.is_connect() || e.is_timeout() || e.is_request() => {
                return Err(Attempt::Retry(Error::Embedding(e.to_string())))
            }
            Err(e) => return Err(Attempt::Fatal(Error::Http(e))),
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = Error::Embedding(format!("Embedding API returned {}: {}", status, body));
            return if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                Err(Attempt::Retry(err))
            } else {
                Err(Attempt::Fatal(err))
            };
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| Attempt::Fatal(Error::Embedding(format!("Invalid response: {}", e))))?;
        parsed.into_first().ok_or_else(|| {
            Attempt::Fatal(Error::Embedding(
                "Embedding API returned no embeddings".to_string(),
            ))
        })
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut last_err: Option<Error> = None;

        for attempt in 0..=self.retries {
            match self.attempt(text).await {
                Ok(embedding) => {
                    self.validate_dimension(&embedding)?;
                    return Ok(embedding);
                }
                Err(Attempt::Fatal(e)) => return Err(e),
                Err(Attempt::Retry(e)) => {
                    debug!(attempt, error = %e, "Embedding request failed, retrying");
                    last_err = Some(e);
                }
            }

            if attempt < self.retries {
                tokio::time::sleep(Duration::from_millis(200 * (attempt + 1) as u64)).await;
            }
        }

        Err(last_err.unwrap_or_else(|| {
            Error::Embedding("Embedding API request failed".to_string())
        }))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
