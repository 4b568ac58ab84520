//! Pipeline service
//!
//! Owns the queue, the ingestion worker and the directory watcher for the
//! lifetime of a `serve` run. Construct it explicitly and share it by
//! reference; `enqueue` and `status_counts` are safe to call concurrently
//! with the running worker.

use crate::config::Config;
use crate::embed::EmbeddingAdapter;
use crate::error::Result;
use crate::extract::{PdfExtractor, TextExtractor};
use crate::queue::{EnqueueOutcome, QueueStore, StatusCounts};
use crate::store::{QdrantStore, VectorStore};
use crate::watch::DirectoryWatcher;
use crate::worker::{IngestionWorker, WorkerSettings};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Directory watching options
#[derive(Debug, Clone)]
pub struct WatchSettings {
    pub root: PathBuf,
    pub sweep_on_start: bool,
}

/// Startup options for the service
#[derive(Debug, Clone, Default)]
pub struct ServiceOptions {
    /// Watch a directory for new PDFs; `None` disables the watcher
    pub watch: Option<WatchSettings>,
    /// Reset tasks left in `processing` by a previous run before starting
    pub recover_abandoned_on_start: bool,
}

impl ServiceOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            watch: config.watch.enabled.then(|| WatchSettings {
                root: config.watch_dir(),
                sweep_on_start: config.watch.sweep_on_start,
            }),
            recover_abandoned_on_start: config.queue.recover_abandoned_on_start,
        }
    }
}

pub struct PipelineService {
    queue: QueueStore,
    worker: Arc<IngestionWorker>,
    wake: Arc<Notify>,
    cancel: CancellationToken,
    options: ServiceOptions,
    worker_handle: Option<JoinHandle<()>>,
    watcher: Option<DirectoryWatcher>,
}

impl PipelineService {
    pub fn new(
        queue: QueueStore,
        extractor: Arc<dyn TextExtractor>,
        embedder: Arc<EmbeddingAdapter>,
        store: Arc<dyn VectorStore>,
        settings: WorkerSettings,
        options: ServiceOptions,
    ) -> Self {
        let worker = Arc::new(IngestionWorker::new(
            queue.clone(),
            extractor,
            embedder,
            store,
            settings,
        ));

        Self {
            queue,
            worker,
            wake: Arc::new(Notify::new()),
            cancel: CancellationToken::new(),
            options,
            worker_handle: None,
            watcher: None,
        }
    }

    /// Wire the production collaborators described by `config`
    pub async fn from_config(config: &Config) -> Result<Self> {
        let queue = QueueStore::connect(config).await?;

        let store = QdrantStore::connect(config).await?;
        store.ensure_collection().await?;

        let embedder = Arc::new(EmbeddingAdapter::from_config(&config.embedding)?);

        Ok(Self::new(
            queue,
            Arc::new(PdfExtractor::new()),
            embedder,
            Arc::new(store),
            WorkerSettings::from_config(config),
            ServiceOptions::from_config(config),
        ))
    }

    /// Spawn the worker and start the watcher
    pub async fn start(&mut self) -> Result<()> {
        if self.worker_handle.is_some() {
            warn!("Pipeline service is already running");
            return Ok(());
        }

        if self.options.recover_abandoned_on_start {
            let recovered = self.queue.recover_abandoned().await?;
            info!(recovered, "Recovered abandoned tasks");
        }

        let worker = self.worker.clone();
        let cancel = self.cancel.clone();
        let wake = self.wake.clone();
        self.worker_handle = Some(tokio::spawn(async move {
            worker.run(cancel, wake).await;
        }));

        if let Some(watch) = &self.options.watch {
            let watcher = DirectoryWatcher::start(
                &watch.root,
                self.queue.clone(),
                self.wake.clone(),
                watch.sweep_on_start,
            )
            .await?;
            self.watcher = Some(watcher);
        }

        info!("Pipeline service started");
        Ok(())
    }

    /// Queue a file and wake the worker when the task was accepted
    pub async fn enqueue(
        &self,
        file_path: &str,
        metadata: Option<&serde_json::Value>,
    ) -> Result<EnqueueOutcome> {
        let outcome = self.queue.enqueue(file_path, metadata).await?;
        if outcome.accepted {
            self.wake.notify_one();
        }
        Ok(outcome)
    }

    pub async fn status_counts(&self) -> Result<StatusCounts> {
        self.queue.status_counts().await
    }

    pub fn queue(&self) -> &QueueStore {
        &self.queue
    }

    /// A token that stops the worker when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stop the watcher, then let the worker finish its current task and exit
    pub async fn shutdown(mut self) {
        info!("Shutting down pipeline service");

        if let Some(watcher) = self.watcher.take() {
            watcher.stop().await;
        }

        self.cancel.cancel();
        if let Some(handle) = self.worker_handle.take() {
            if let Err(e) = handle.await {
                warn!(error = %e, "Worker task ended abnormally");
            }
        }

        info!("Pipeline service stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChunkConfig;
    use crate::embed::testing::FakeEmbedder;
    use crate::queue::TaskStatus;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use std::path::Path;
    use std::time::{Duration, Instant};
    use tempfile::TempDir;

    /// Returns the same text for every file after an optional delay
    struct StaticExtractor {
        delay: Duration,
    }

    #[async_trait]
    impl TextExtractor for StaticExtractor {
        async fn extract(&self, _path: &Path) -> Result<String> {
            tokio::time::sleep(self.delay).await;
            Ok("a short paper about embeddings".to_string())
        }
    }

    fn settings() -> WorkerSettings {
        WorkerSettings {
            chunk: ChunkConfig {
                size: 10,
                overlap: 2,
            },
            poll_interval: Duration::from_millis(50),
            storage_error_backoff: Duration::from_millis(50),
        }
    }

    async fn build(
        tmp: &TempDir,
        delay: Duration,
        options: ServiceOptions,
    ) -> (PipelineService, Arc<MemoryStore>) {
        let queue = QueueStore::open(&tmp.path().join("queue.db")).await.unwrap();
        let store = Arc::new(MemoryStore::new());
        let adapter = Arc::new(EmbeddingAdapter::new(
            Arc::new(FakeEmbedder::new(8)),
            Duration::ZERO,
        ));
        let service = PipelineService::new(
            queue,
            Arc::new(StaticExtractor { delay }),
            adapter,
            store.clone(),
            settings(),
            options,
        );
        (service, store)
    }

    async fn wait_until<F>(service: &PipelineService, mut done: F)
    where
        F: FnMut(&StatusCounts) -> bool,
    {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            let counts = service.status_counts().await.unwrap();
            if done(&counts) {
                return;
            }
            assert!(Instant::now() < deadline, "timed out, counts: {counts:?}");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[tokio::test]
    async fn test_enqueue_is_processed_by_running_service() {
        let tmp = TempDir::new().unwrap();
        let (mut service, store) = build(&tmp, Duration::ZERO, ServiceOptions::default()).await;
        service.start().await.unwrap();

        let first = service.enqueue("/papers/a.pdf", None).await.unwrap();
        assert!(first.accepted);

        wait_until(&service, |c| c.completed == 1).await;
        assert!(!store.is_empty().unwrap());

        service.shutdown().await;
    }

    #[tokio::test]
    async fn test_watched_directory_feeds_worker() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("papers");
        std::fs::create_dir_all(&root).unwrap();
        std::fs::write(root.join("existing.pdf"), b"%PDF").unwrap();

        let options = ServiceOptions {
            watch: Some(WatchSettings {
                root: root.clone(),
                sweep_on_start: true,
            }),
            recover_abandoned_on_start: false,
        };
        let (mut service, _store) = build(&tmp, Duration::ZERO, options).await;
        service.start().await.unwrap();

        std::fs::write(root.join("new.pdf"), b"%PDF").unwrap();
        wait_until(&service, |c| c.completed == 2).await;

        service.shutdown().await;
    }

    #[tokio::test]
    async fn test_recover_abandoned_on_start() {
        let tmp = TempDir::new().unwrap();
        let options = ServiceOptions {
            watch: None,
            recover_abandoned_on_start: true,
        };
        let (mut service, _store) = build(&tmp, Duration::ZERO, options).await;

        // Simulate a crash mid-task
        service.queue().enqueue("/papers/a.pdf", None).await.unwrap();
        service.queue().dequeue_next().await.unwrap().unwrap();

        service.start().await.unwrap();
        wait_until(&service, |c| c.completed == 1 && c.processing == 0).await;
        service.shutdown().await;
    }

    #[tokio::test]
    async fn test_abandoned_tasks_stay_put_by_default() {
        let tmp = TempDir::new().unwrap();
        let (mut service, _store) = build(&tmp, Duration::ZERO, ServiceOptions::default()).await;

        service.queue().enqueue("/papers/a.pdf", None).await.unwrap();
        service.queue().dequeue_next().await.unwrap().unwrap();

        service.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(service.status_counts().await.unwrap().processing, 1);
        service.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_finishes_in_flight_task() {
        let tmp = TempDir::new().unwrap();
        let (mut service, _store) =
            build(&tmp, Duration::from_millis(300), ServiceOptions::default()).await;
        service.start().await.unwrap();

        let outcome = service.enqueue("/papers/slow.pdf", None).await.unwrap();
        wait_until(&service, |c| c.processing == 1).await;

        let queue = service.queue().clone();
        service.shutdown().await;

        let task = queue.get_task(outcome.task_id).await.unwrap().unwrap();
        assert_eq!(task.task_status().unwrap(), TaskStatus::Completed);
    }
}
