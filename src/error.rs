//! Custom error types for papershelf

use crate::queue::TaskStatus;
use thiserror::Error;

/// Main error type for papershelf operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Qdrant error: {0}")]
    Qdrant(String),

    #[error("Vector store error: {0}")]
    Store(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Text extraction failed for {path}: {reason}")]
    Extraction { path: String, reason: String },

    #[error("Watcher error: {0}")]
    Watch(#[from] notify::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Task not found: {0}")]
    TaskNotFound(i64),

    #[error("Task {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: i64,
        from: TaskStatus,
        to: TaskStatus,
    },

    #[error("Paper not found: {0}")]
    PaperNotFound(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Invalid metadata: {0}")]
    InvalidMetadata(String),
}

/// Result type alias for papershelf
pub type Result<T> = std::result::Result<T, Error>;

/// Convert qdrant errors
impl From<qdrant_client::QdrantError> for Error {
    fn from(err: qdrant_client::QdrantError) -> Self {
        Error::Qdrant(err.to_string())
    }
}
