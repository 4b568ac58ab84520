//! Status command implementation

use crate::config::Config;
use crate::error::Result;
use crate::queue::{QueueStore, StatusCounts};
use crate::store::QdrantStore;
use serde::Serialize;
use tracing::{debug, info};

/// Status information
#[derive(Debug, Clone, Serialize)]
pub struct StatusInfo {
    pub config_path: String,
    pub queue_db_path: String,
    pub watch_dir: String,
    pub qdrant_url: String,
    pub collection_name: String,
    pub embedding_model: String,
    pub embedding_dimension: usize,
    pub qdrant_connected: bool,
    pub collection_exists: bool,
    pub qdrant_points: u64,
    pub queue: StatusCounts,
}

/// Get system status
pub async fn cmd_status(
    config: &Config,
    queue: &QueueStore,
    store: &QdrantStore,
) -> Result<StatusInfo> {
    info!("Getting status");

    let counts = queue.status_counts().await?;

    let (qdrant_connected, collection_exists, qdrant_points) =
        match store.get_collection_info().await {
            Ok(Some(info)) => (true, true, info.points_count),
            Ok(None) => (true, false, 0),
            Err(e) => {
                debug!("Qdrant connection error: {:?}", e);
                (false, false, 0)
            }
        };

    Ok(StatusInfo {
        config_path: config.paths.config_file.display().to_string(),
        queue_db_path: config.paths.queue_db_file.display().to_string(),
        watch_dir: config.watch_dir().display().to_string(),
        qdrant_url: config.qdrant_url.clone(),
        collection_name: config.collection_name.clone(),
        embedding_model: config.embedding.model.clone(),
        embedding_dimension: config.embedding.resolved_dimension(),
        qdrant_connected,
        collection_exists,
        qdrant_points,
        queue: counts,
    })
}

/// Print status to console
pub fn print_status(status: &StatusInfo) {
    println!("\n📊 papershelf Status\n");
    println!("Configuration: {}", status.config_path);
    println!("Queue: {}", status.queue_db_path);
    println!("Watching: {}", status.watch_dir);
    println!("\nQdrant:");
    println!("  URL: {}", status.qdrant_url);
    println!("  Collection: {}", status.collection_name);

    let connection_status = if status.qdrant_connected {
        if status.collection_exists {
            "✓ Connected"
        } else {
            "⚠ Connected (collection not created - run 'papershelf serve' to create)"
        }
    } else {
        "✗ Not connected"
    };
    println!("  Status: {}", connection_status);
    println!("  Points: {}", status.qdrant_points);
    println!(
        "\nEmbedding Model: {} ({} dims)",
        status.embedding_model, status.embedding_dimension
    );
    println!("\nQueue:");
    println!("  Pending: {}", status.queue.pending);
    println!("  Processing: {}", status.queue.processing);
    println!("  Completed: {}", status.queue.completed);
    println!("  Failed: {}", status.queue.failed);
}
