//! Init command implementation

use crate::config::{Config, PathsConfig};
use crate::error::{Error, Result};
use crate::queue::QueueStore;
use crate::store::QdrantStore;
use serde::Serialize;
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct InitOptions {
    pub base_dir: PathBuf,
    pub config_path: PathBuf,
    pub force: bool,
    /// Written to the new config instead of the default URL
    pub qdrant_url: Option<String>,
}

/// What `init` set up
#[derive(Debug, Clone, Serialize)]
pub struct InitReport {
    pub config_path: String,
    pub queue_db_path: String,
    pub watch_dir: String,
    pub collection_name: String,
    /// False when Qdrant could not be reached; `serve` creates it later
    pub collection_ready: bool,
}

/// Write a default config, create the queue database and the watched directory
pub async fn cmd_init(options: InitOptions) -> Result<InitReport> {
    let InitOptions {
        base_dir,
        config_path,
        force,
        qdrant_url,
    } = options;

    if config_path.exists() && !force {
        return Err(Error::Config(format!(
            "Config already exists at {}. Use --force to overwrite.",
            config_path.display()
        )));
    }

    let mut config = Config::default();
    config.paths = PathsConfig::for_base(base_dir);
    config.paths.config_file = config_path;
    if let Some(url) = qdrant_url {
        config.qdrant_url = url;
    }
    config.validate()?;
    config.save()?;

    QueueStore::open(&config.paths.queue_db_file).await?;
    info!("Initialized queue at {:?}", config.paths.queue_db_file);

    let watch_dir = config.watch_dir();
    std::fs::create_dir_all(&watch_dir)?;

    let collection_ready = match QdrantStore::connect(&config).await {
        Ok(store) => match store.ensure_collection().await {
            Ok(()) => true,
            Err(e) => {
                warn!("Could not create Qdrant collection: {}", e);
                false
            }
        },
        Err(e) => {
            warn!("Could not connect to Qdrant: {}", e);
            false
        }
    };

    Ok(InitReport {
        config_path: config.paths.config_file.display().to_string(),
        queue_db_path: config.paths.queue_db_file.display().to_string(),
        watch_dir: watch_dir.display().to_string(),
        collection_name: config.collection_name,
        collection_ready,
    })
}

pub fn print_init_report(report: &InitReport) {
    println!("\n✓ papershelf initialized\n");
    println!("Config: {}", report.config_path);
    println!("Queue: {}", report.queue_db_path);
    println!("Watching: {}", report.watch_dir);
    if report.collection_ready {
        println!("Collection: {} ✓", report.collection_name);
    } else {
        println!(
            "Collection: {} (Qdrant not reachable, created on first 'papershelf serve')",
            report.collection_name
        );
    }
}
