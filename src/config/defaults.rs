//! Default values for configuration

/// Default Qdrant gRPC URL for local development (port 6334, not 6333 REST)
pub fn default_qdrant_url() -> String {
    std::env::var("QDRANT_URL").unwrap_or_else(|_| "http://127.0.0.1:6334".to_string())
}

/// Default environment variable name for Qdrant API key
pub fn default_qdrant_api_key_env() -> String {
    "QDRANT_API_KEY".to_string()
}

/// Default collection name
pub fn default_collection_name() -> String {
    "research_papers".to_string()
}

/// Default directory watched for new PDFs
pub fn default_watch_dir() -> String {
    "research_papers".to_string()
}

pub fn default_watch_enabled() -> bool {
    true
}

/// Default: enqueue PDFs already present when the watcher starts
pub fn default_sweep_on_start() -> bool {
    true
}

/// Default embedding model
pub fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

/// Default embedding dimension (text-embedding-3-small)
pub fn default_embedding_dimension() -> usize {
    1536
}

/// Default OpenAI-compatible API base URL
pub fn default_embedding_base_url() -> String {
    "https://api.openai.com/v1/".to_string()
}

/// Default environment variable name for the embedding API key
pub fn default_embedding_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

/// Default delay between embedding calls (milliseconds)
pub fn default_embedding_request_delay() -> u64 {
    500
}

/// Default embedding request timeout in seconds
pub fn default_embedding_timeout() -> u64 {
    30
}

/// Default transport retries per embedding call
pub fn default_embedding_max_retries() -> usize {
    2
}

/// Default characters per chunk
pub fn default_chunk_size() -> usize {
    4000
}

/// Default overlap characters between chunks
pub fn default_chunk_overlap() -> usize {
    1000
}

/// Default queue poll interval (milliseconds)
pub fn default_poll_interval() -> u64 {
    1000
}

/// Default pause after a queue storage error (milliseconds)
pub fn default_storage_error_backoff() -> u64 {
    5000
}

/// Default: leave abandoned `processing` tasks alone at startup
pub fn default_recover_abandoned_on_start() -> bool {
    false
}

/// Default number of search results
pub fn default_search_results() -> usize {
    5
}

/// Default preview length for search result content
pub fn default_search_preview_chars() -> usize {
    1000
}
