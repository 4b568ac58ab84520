//! Configuration management for papershelf
//!
//! Handles loading, saving, and validating configuration from TOML files.
//! A handful of environment variables override file values at load time.

mod defaults;

pub use defaults::*;

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Qdrant connection URL
    #[serde(default = "default_qdrant_url")]
    pub qdrant_url: String,

    /// Environment variable name for Qdrant API key
    #[serde(default = "default_qdrant_api_key_env")]
    pub qdrant_api_key_env: String,

    /// Qdrant collection name
    #[serde(default = "default_collection_name")]
    pub collection_name: String,

    /// Watched directory configuration
    #[serde(default)]
    pub watch: WatchConfig,

    /// Embedding API configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Chunking configuration
    #[serde(default)]
    pub chunk: ChunkConfig,

    /// Work queue configuration
    #[serde(default)]
    pub queue: QueueConfig,

    /// Search configuration
    #[serde(default)]
    pub search: SearchConfig,

    /// Paths configuration (internal, not user-editable)
    #[serde(skip)]
    pub paths: PathsConfig,
}

/// Watched directory configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Directory observed for new PDFs (relative paths resolve against the base dir)
    #[serde(default = "default_watch_dir")]
    pub dir: String,

    /// Run the filesystem watcher when serving
    #[serde(default = "default_watch_enabled")]
    pub enabled: bool,

    /// Enqueue PDFs already present when the watcher starts
    #[serde(default = "default_sweep_on_start")]
    pub sweep_on_start: bool,
}

/// Embedding API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Model name/identifier
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Embedding dimension (must match model)
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,

    /// OpenAI-compatible API base URL
    #[serde(default = "default_embedding_base_url")]
    pub base_url: String,

    /// Environment variable holding the API key
    #[serde(default = "default_embedding_api_key_env")]
    pub api_key_env: String,

    /// Minimum delay between successive embedding calls (milliseconds)
    #[serde(default = "default_embedding_request_delay")]
    pub request_delay_ms: u64,

    /// Request timeout in seconds
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,

    /// Transport retries per call (connection errors, 429, 5xx)
    #[serde(default = "default_embedding_max_retries")]
    pub max_retries: usize,
}

/// Lookup the expected embedding dimension for a known model
pub fn embedding_dimension_for_model(model: &str) -> Option<usize> {
    match model {
        "text-embedding-3-small" => Some(1536),
        "text-embedding-3-large" => Some(3072),
        "text-embedding-ada-002" => Some(1536),
        _ => None,
    }
}

impl EmbeddingConfig {
    /// Resolve the effective embedding dimension based on the configured model
    pub fn resolved_dimension(&self) -> usize {
        if let Some(expected) = embedding_dimension_for_model(&self.model) {
            if expected != self.dimension {
                warn!(
                    "Embedding dimension {} does not match model '{}' ({}); using {}",
                    self.dimension, self.model, expected, expected
                );
            }
            expected
        } else {
            self.dimension
        }
    }

    /// Get the API key from environment
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env).ok()
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }
}

/// Chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkConfig {
    /// Characters per chunk
    #[serde(default = "default_chunk_size")]
    pub size: usize,

    /// Overlap characters between consecutive chunks
    #[serde(default = "default_chunk_overlap")]
    pub overlap: usize,
}

/// Work queue configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Idle poll interval for the worker (milliseconds)
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Pause after a queue storage error before polling again (milliseconds)
    #[serde(default = "default_storage_error_backoff")]
    pub storage_error_backoff_ms: u64,

    /// Reset tasks left in `processing` by a crashed run back to `pending` at startup
    #[serde(default = "default_recover_abandoned_on_start")]
    pub recover_abandoned_on_start: bool,
}

/// Search configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Default number of results
    #[serde(default = "default_search_results")]
    pub default_results: usize,

    /// Characters of chunk text shown per result
    #[serde(default = "default_search_preview_chars")]
    pub preview_chars: usize,
}

/// Internal paths configuration
#[derive(Debug, Clone, Default)]
pub struct PathsConfig {
    /// Base directory for papershelf data
    pub base_dir: PathBuf,

    /// Path to config file
    pub config_file: PathBuf,

    /// Path to the SQLite work queue
    pub queue_db_file: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            qdrant_url: default_qdrant_url(),
            qdrant_api_key_env: default_qdrant_api_key_env(),
            collection_name: default_collection_name(),
            watch: WatchConfig::default(),
            embedding: EmbeddingConfig::default(),
            chunk: ChunkConfig::default(),
            queue: QueueConfig::default(),
            search: SearchConfig::default(),
            paths: PathsConfig::default(),
        }
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            dir: default_watch_dir(),
            enabled: default_watch_enabled(),
            sweep_on_start: default_sweep_on_start(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: default_embedding_model(),
            dimension: default_embedding_dimension(),
            base_url: default_embedding_base_url(),
            api_key_env: default_embedding_api_key_env(),
            request_delay_ms: default_embedding_request_delay(),
            timeout_secs: default_embedding_timeout(),
            max_retries: default_embedding_max_retries(),
        }
    }
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            size: default_chunk_size(),
            overlap: default_chunk_overlap(),
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval(),
            storage_error_backoff_ms: default_storage_error_backoff(),
            recover_abandoned_on_start: default_recover_abandoned_on_start(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_results: default_search_results(),
            preview_chars: default_search_preview_chars(),
        }
    }
}

impl Config {
    /// Get the default base directory for papershelf (~/.papershelf)
    pub fn default_base_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".papershelf")
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        Self::default_base_dir().join("config.toml")
    }

    /// Initialize paths configuration
    fn init_paths(&mut self, base_dir: Option<PathBuf>) {
        let base = base_dir.unwrap_or_else(Self::default_base_dir);
        self.paths = PathsConfig::for_base(base);
    }

    /// Load configuration from a specific file path
    pub fn load(config_path: &Path) -> Result<Self> {
        debug!("Loading config from {:?}", config_path);

        if !config_path.exists() {
            return Err(Error::Config(format!(
                "Config file not found: {}",
                config_path.display()
            )));
        }

        let content = std::fs::read_to_string(config_path)?;
        let mut config: Config = toml::from_str(&content)?;

        // Set up paths based on config file location
        let base = config_path.parent().unwrap_or(Path::new(".")).to_path_buf();
        config.paths = PathsConfig::for_base(base);
        config.paths.config_file = config_path.to_path_buf();

        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific base directory, falling back to defaults
    pub fn load_from(base_dir: Option<PathBuf>) -> Result<Self> {
        let mut config = Config::default();
        config.init_paths(base_dir);

        if config.paths.config_file.exists() {
            debug!("Loading config from {:?}", config.paths.config_file);
            let content = std::fs::read_to_string(&config.paths.config_file)?;
            let mut loaded: Config = toml::from_str(&content)?;
            loaded.paths = config.paths;
            config = loaded;
        } else {
            debug!("No config file found, using defaults");
        }

        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.paths.config_file.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&self.paths.config_file, content)?;
        info!("Saved config to {:?}", self.paths.config_file);
        Ok(())
    }

    /// Get the Qdrant API key from environment
    pub fn qdrant_api_key(&self) -> Option<String> {
        if self.qdrant_api_key_env.is_empty() {
            return None;
        }
        std::env::var(&self.qdrant_api_key_env).ok()
    }

    /// Resolve the watched directory against the base directory
    pub fn watch_dir(&self) -> PathBuf {
        let dir = PathBuf::from(&self.watch.dir);
        if dir.is_absolute() {
            dir
        } else {
            self.paths.base_dir.join(dir)
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.queue.poll_interval_ms)
    }

    pub fn storage_error_backoff(&self) -> Duration {
        Duration::from_millis(self.queue.storage_error_backoff_ms)
    }

    /// Apply environment overrides for the ingestion settings
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(size) = env_usize("CHUNK_SIZE")? {
            self.chunk.size = size;
        }
        if let Some(overlap) = env_usize("CHUNK_OVERLAP")? {
            self.chunk.overlap = overlap;
        }
        if let Ok(model) = std::env::var("EMBEDDING_MODEL") {
            self.embedding.model = model;
        }
        if let Ok(collection) = std::env::var("COLLECTION_NAME") {
            self.collection_name = collection;
        }
        if let Ok(base_url) = std::env::var("OPENAI_BASE_URL") {
            self.embedding.base_url = base_url;
        }
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.chunk.size == 0 {
            return Err(Error::Config("chunk.size must be positive".to_string()));
        }

        if self.chunk.overlap >= self.chunk.size {
            return Err(Error::Config(
                "chunk.overlap must be < chunk.size".to_string(),
            ));
        }

        if self.embedding.model.trim().is_empty() {
            return Err(Error::Config("embedding.model must be set".to_string()));
        }

        if self.embedding.dimension == 0 {
            return Err(Error::Config(
                "embedding.dimension must be positive".to_string(),
            ));
        }

        if self.collection_name.trim().is_empty() {
            return Err(Error::Config("collection_name must be set".to_string()));
        }

        if self.queue.poll_interval_ms == 0 {
            return Err(Error::Config(
                "queue.poll_interval_ms must be positive".to_string(),
            ));
        }

        if self.search.default_results == 0 {
            return Err(Error::Config(
                "search.default_results must be positive".to_string(),
            ));
        }

        url::Url::parse(&self.embedding.base_url).map_err(|e| {
            Error::Config(format!(
                "embedding.base_url '{}' is invalid: {}",
                self.embedding.base_url, e
            ))
        })?;

        Ok(())
    }
}

impl PathsConfig {
    /// Standard file layout under `base`
    pub fn for_base(base: PathBuf) -> Self {
        Self {
            config_file: base.join("config.toml"),
            queue_db_file: base.join("paper_queue.db"),
            base_dir: base,
        }
    }
}

fn env_usize(name: &str) -> Result<Option<usize>> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<usize>()
            .map(Some)
            .map_err(|e| Error::Config(format!("{} must be an integer: {}", name, e))),
        Err(_) => Ok(None),
    }
}
