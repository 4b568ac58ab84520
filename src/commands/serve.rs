//! Serve command implementation

use crate::config::Config;
use crate::error::Result;
use crate::queue::StatusCounts;
use crate::service::PipelineService;
use std::future::Future;
use tracing::info;

/// Run the ingestion pipeline until Ctrl-C
pub async fn cmd_serve(config: &Config) -> Result<StatusCounts> {
    let service = PipelineService::from_config(config).await?;
    run_until(service, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
        }
    })
    .await
}

/// Start `service`, wait for `shutdown`, then stop it
///
/// Returns the queue counts as they were when shutdown began.
pub async fn run_until<F>(mut service: PipelineService, shutdown: F) -> Result<StatusCounts>
where
    F: Future<Output = ()>,
{
    service.start().await?;
    info!("Serving; press Ctrl-C to stop");

    shutdown.await;

    let counts = service.status_counts().await?;
    service.shutdown().await;
    Ok(counts)
}

pub fn print_serve_summary(counts: &StatusCounts) {
    println!("\n⏹ papershelf stopped\n");
    println!("  Pending: {}", counts.pending);
    println!("  Processing: {}", counts.processing);
    println!("  Completed: {}", counts.completed);
    println!("  Failed: {}", counts.failed);
}
