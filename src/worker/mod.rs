//! Background ingestion worker
//!
//! The single consumer of the work queue. Each task goes through
//! extract → chunk → embed → store, and ends as `completed` or `failed`.
//! Nothing is written to the vector store until every chunk has an
//! embedding, and the whole document is then written in one batch.

use crate::chunk::chunk_text;
use crate::config::{ChunkConfig, Config};
use crate::embed::EmbeddingAdapter;
use crate::error::{Error, Result};
use crate::extract::TextExtractor;
use crate::queue::{QueueStore, QueueTask};
use crate::store::{ChunkRecord, Metadata, VectorStore};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Chunk ids checked per round when trimming chunks left by an earlier, longer ingestion
const STALE_SCAN_WINDOW: usize = 64;

/// Worker settings, taken from the validated process configuration
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub chunk: ChunkConfig,
    pub poll_interval: Duration,
    pub storage_error_backoff: Duration,
}

impl WorkerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            chunk: config.chunk.clone(),
            poll_interval: config.poll_interval(),
            storage_error_backoff: config.storage_error_backoff(),
        }
    }
}

/// How a processed task ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Completed { chunks: usize },
    Failed { reason: String },
}

pub struct IngestionWorker {
    queue: QueueStore,
    extractor: Arc<dyn TextExtractor>,
    embedder: Arc<EmbeddingAdapter>,
    store: Arc<dyn VectorStore>,
    settings: WorkerSettings,
}

/// File name used as the document key and chunk id prefix
fn file_name_of(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string())
}

/// Metadata written to every chunk of a document
///
/// Caller metadata is kept as given, with `filename` and `source` filled in
/// when absent. `doc_id` is always the file name.
pub fn document_metadata(task: &QueueTask, filename: &str) -> Result<Metadata> {
    let mut metadata = task.metadata()?.unwrap_or_default();
    metadata
        .entry("filename")
        .or_insert_with(|| Value::String(filename.to_string()));
    metadata
        .entry("source")
        .or_insert_with(|| Value::String(task.file_path.clone()));
    metadata.insert("doc_id".to_string(), Value::String(filename.to_string()));
    Ok(metadata)
}

impl IngestionWorker {
    pub fn new(
        queue: QueueStore,
        extractor: Arc<dyn TextExtractor>,
        embedder: Arc<EmbeddingAdapter>,
        store: Arc<dyn VectorStore>,
        settings: WorkerSettings,
    ) -> Self {
        Self {
            queue,
            extractor,
            embedder,
            store,
            settings,
        }
    }

    /// Claim and process one task
    ///
    /// Returns `Ok(None)` when the queue is empty. Task failures are recorded
    /// on the task; only queue storage errors are returned.
    pub async fn process_next(&self) -> Result<Option<(QueueTask, TaskOutcome)>> {
        let Some(task) = self.queue.dequeue_next().await? else {
            return Ok(None);
        };

        let started = Instant::now();
        info!(task_id = task.id, path = %task.file_path, attempt = task.attempts, "Processing task");

        let outcome = match self.ingest(&task).await {
            Ok(chunks) => {
                self.queue.mark_completed(task.id).await?;
                info!(
                    task_id = task.id,
                    chunks,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Task completed"
                );
                TaskOutcome::Completed { chunks }
            }
            Err(e) => {
                let reason = e.to_string();
                self.queue.mark_failed(task.id, &reason).await?;
                warn!(task_id = task.id, path = %task.file_path, error = %reason, "Task failed");
                TaskOutcome::Failed { reason }
            }
        };

        Ok(Some((task, outcome)))
    }

    /// Run one task through the pipeline, returning the number of chunks written
    async fn ingest(&self, task: &QueueTask) -> Result<usize> {
        let text = self.extractor.extract(Path::new(&task.file_path)).await?;

        let mut chunks = chunk_text(&text, self.settings.chunk.size, self.settings.chunk.overlap)?;
        if chunks.is_empty() {
            chunks.push(String::new());
        }
        debug!(task_id = task.id, chars = text.chars().count(), chunks = chunks.len(), "Chunked text");

        let embeddings = self.embedder.embed_chunks(&chunks).await?;
        if embeddings.len() != chunks.len() {
            return Err(Error::Embedding(format!(
                "expected {} embeddings, got {}",
                chunks.len(),
                embeddings.len()
            )));
        }

        let filename = file_name_of(&task.file_path);
        let metadata = document_metadata(task, &filename)?;

        let records: Vec<ChunkRecord> = chunks
            .into_iter()
            .zip(embeddings)
            .enumerate()
            .map(|(i, (text, embedding))| ChunkRecord {
                id: format!("{}_{}", filename, i),
                text,
                embedding,
                metadata: metadata.clone(),
            })
            .collect();
        let written = records.len();

        self.store.add_chunks(records).await?;

        // The document is stored; leftovers only cost search noise
        if let Err(e) = self.remove_stale_chunks(&filename, written).await {
            warn!(task_id = task.id, filename = %filename, error = %e, "Failed to remove stale chunks");
        }

        Ok(written)
    }

    /// Delete `{filename}_{n}` chunks for every `n >= from`
    async fn remove_stale_chunks(&self, filename: &str, from: usize) -> Result<()> {
        let mut start = from;
        let mut removed = 0;

        loop {
            let ids: Vec<String> = (start..start + STALE_SCAN_WINDOW)
                .map(|i| format!("{}_{}", filename, i))
                .collect();
            let found = self.store.get_by_ids(&ids).await?;
            if found.is_empty() {
                break;
            }

            let stale: Vec<String> = found.into_iter().map(|c| c.id).collect();
            removed += stale.len();
            self.store.delete_by_ids(&stale).await?;
            start += STALE_SCAN_WINDOW;
        }

        if removed > 0 {
            debug!(filename, removed, "Removed stale chunks from earlier ingestion");
        }
        Ok(())
    }

    /// Process tasks until `cancel` fires
    ///
    /// Waits for the poll interval or a `wake` signal when the queue is empty.
    /// Cancellation is only observed between tasks.
    pub async fn run(&self, cancel: CancellationToken, wake: Arc<Notify>) {
        info!(
            poll_interval_ms = self.settings.poll_interval.as_millis() as u64,
            chunk_size = self.settings.chunk.size,
            chunk_overlap = self.settings.chunk.overlap,
            model = self.embedder.model_name(),
            "Ingestion worker started"
        );

        loop {
            if cancel.is_cancelled() {
                break;
            }

            match self.process_next().await {
                Ok(Some(_)) => continue,
                Ok(None) => {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = wake.notified() => debug!("Worker woken by enqueue"),
                        _ = tokio::time::sleep(self.settings.poll_interval) => {}
                    }
                }
                Err(e) => {
                    error!(error = %e, "Queue storage error, pausing worker");
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(self.settings.storage_error_backoff) => {}
                    }
                }
            }
        }

        info!("Ingestion worker stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed::testing::FakeEmbedder;
    use crate::queue::TaskStatus;
    use crate::store::{MemoryStore, MetadataFilter, ScoredChunk, StoredChunk};
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use tempfile::TempDir;

    const DIM: usize = 8;

    /// Serves text from memory keyed by path
    #[derive(Default)]
    struct FakeExtractor {
        texts: Mutex<HashMap<String, String>>,
    }

    impl FakeExtractor {
        fn set(&self, path: &str, text: String) {
            self.texts.lock().unwrap().insert(path.to_string(), text);
        }
    }

    #[async_trait]
    impl TextExtractor for FakeExtractor {
        async fn extract(&self, path: &Path) -> Result<String> {
            let key = path.display().to_string();
            self.texts
                .lock()
                .unwrap()
                .get(&key)
                .cloned()
                .ok_or_else(|| Error::Extraction {
                    path: key,
                    reason: "unreadable".to_string(),
                })
        }
    }

    /// Rejects writes whose chunk ids start with `bad`, and lookups of ids starting with `flaky`
    struct PickyStore {
        inner: MemoryStore,
    }

    #[async_trait]
    impl VectorStore for PickyStore {
        async fn add_chunks(&self, chunks: Vec<ChunkRecord>) -> Result<()> {
            if chunks.iter().any(|c| c.id.starts_with("bad")) {
                return Err(Error::Store("write rejected".to_string()));
            }
            self.inner.add_chunks(chunks).await
        }
        async fn get_by_ids(&self, ids: &[String]) -> Result<Vec<StoredChunk>> {
            if ids.iter().any(|id| id.starts_with("flaky")) {
                return Err(Error::Store("lookup timed out".to_string()));
            }
            self.inner.get_by_ids(ids).await
        }
        async fn update_metadata(&self, ids: &[String], metadatas: Vec<Metadata>) -> Result<()> {
            self.inner.update_metadata(ids, metadatas).await
        }
        async fn delete_by_ids(&self, ids: &[String]) -> Result<()> {
            self.inner.delete_by_ids(ids).await
        }
        async fn query(
            &self,
            embedding: Vec<f32>,
            k: usize,
            filter: Option<MetadataFilter>,
        ) -> Result<Vec<ScoredChunk>> {
            self.inner.query(embedding, k, filter).await
        }
        async fn list(&self) -> Result<Vec<StoredChunk>> {
            self.inner.list().await
        }
    }

    struct Harness {
        worker: Arc<IngestionWorker>,
        queue: QueueStore,
        extractor: Arc<FakeExtractor>,
        store: Arc<dyn VectorStore>,
        _tmp: TempDir,
    }

    async fn harness_with(embedder: FakeEmbedder, store: Arc<dyn VectorStore>) -> Harness {
        let tmp = TempDir::new().unwrap();
        let queue = QueueStore::open(&tmp.path().join("queue.db")).await.unwrap();
        let extractor = Arc::new(FakeExtractor::default());
        let adapter = Arc::new(EmbeddingAdapter::new(Arc::new(embedder), Duration::ZERO));
        let settings = WorkerSettings {
            chunk: ChunkConfig {
                size: 4000,
                overlap: 1000,
            },
            poll_interval: Duration::from_millis(50),
            storage_error_backoff: Duration::from_millis(50),
        };
        let worker = Arc::new(IngestionWorker::new(
            queue.clone(),
            extractor.clone(),
            adapter,
            store.clone(),
            settings,
        ));
        Harness {
            worker,
            queue,
            extractor,
            store,
            _tmp: tmp,
        }
    }

    async fn harness() -> Harness {
        harness_with(FakeEmbedder::new(DIM), Arc::new(MemoryStore::new())).await
    }

    fn long_text(chars: usize) -> String {
        (0..chars).map(|i| char::from(b'a' + (i % 26) as u8)).collect()
    }

    #[tokio::test]
    async fn test_ingests_document_in_overlapping_chunks() {
        let h = harness().await;
        h.extractor.set("/papers/a.pdf", long_text(10_000));
        h.queue.enqueue("/papers/a.pdf", None).await.unwrap();

        let (_, outcome) = h.worker.process_next().await.unwrap().unwrap();
        assert_eq!(outcome, TaskOutcome::Completed { chunks: 3 });

        let ids: Vec<String> = h.store.list().await.unwrap().into_iter().map(|c| c.id).collect();
        assert_eq!(ids, vec!["a.pdf_0", "a.pdf_1", "a.pdf_2"]);

        let counts = h.queue.status_counts().await.unwrap();
        assert_eq!(counts.completed, 1);
        assert_eq!(counts.total(), 1);

        let chunk = &h.store.get_by_ids(&["a.pdf_1".to_string()]).await.unwrap()[0];
        assert_eq!(chunk.text.chars().count(), 4000);
        assert_eq!(chunk.metadata["filename"], "a.pdf");
        assert_eq!(chunk.metadata["source"], "/papers/a.pdf");
        assert_eq!(chunk.metadata["doc_id"], "a.pdf");
    }

    #[tokio::test]
    async fn test_embedding_failure_writes_nothing() {
        let h = harness_with(FakeEmbedder::failing_on(DIM, 1), Arc::new(MemoryStore::new())).await;
        h.extractor.set("/papers/a.pdf", long_text(10_000));
        let outcome = h.queue.enqueue("/papers/a.pdf", None).await.unwrap();

        let (_, result) = h.worker.process_next().await.unwrap().unwrap();
        assert!(matches!(result, TaskOutcome::Failed { .. }));

        assert!(h.store.list().await.unwrap().is_empty());
        let task = h.queue.get_task(outcome.task_id).await.unwrap().unwrap();
        assert_eq!(task.task_status().unwrap(), TaskStatus::Failed);
        assert!(task.error_message.unwrap().contains("chunk 2 of 3"));
    }

    #[tokio::test]
    async fn test_stale_cleanup_failure_still_completes() {
        let store = Arc::new(PickyStore {
            inner: MemoryStore::new(),
        });
        let h = harness_with(FakeEmbedder::new(DIM), store.clone()).await;
        h.extractor.set("/papers/flaky.pdf", long_text(5_000));
        let outcome = h.queue.enqueue("/papers/flaky.pdf", None).await.unwrap();

        let (_, result) = h.worker.process_next().await.unwrap().unwrap();
        assert_eq!(result, TaskOutcome::Completed { chunks: 2 });

        let task = h.queue.get_task(outcome.task_id).await.unwrap().unwrap();
        assert_eq!(task.task_status().unwrap(), TaskStatus::Completed);
        assert_eq!(store.inner.len().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_extraction_failure_marks_failed() {
        let h = harness().await;
        let outcome = h.queue.enqueue("/papers/scanned.pdf", None).await.unwrap();

        let (_, result) = h.worker.process_next().await.unwrap().unwrap();
        assert!(matches!(result, TaskOutcome::Failed { reason } if reason.contains("unreadable")));

        let counts = h.queue.status_counts().await.unwrap();
        assert_eq!(counts.failed, 1);
        let task = h.queue.get_task(outcome.task_id).await.unwrap().unwrap();
        assert!(task.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_empty_text_stores_one_empty_chunk() {
        let h = harness().await;
        h.extractor.set("/papers/blank.pdf", String::new());
        h.queue.enqueue("/papers/blank.pdf", None).await.unwrap();

        let (_, outcome) = h.worker.process_next().await.unwrap().unwrap();
        assert_eq!(outcome, TaskOutcome::Completed { chunks: 1 });

        let chunks = h.store.list().await.unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].id, "blank.pdf_0");
        assert_eq!(chunks[0].text, "");
    }

    #[tokio::test]
    async fn test_caller_metadata_is_kept_and_completed() {
        let h = harness().await;
        h.extractor.set("/papers/a.pdf", "short paper".to_string());
        h.queue
            .enqueue(
                "/papers/a.pdf",
                Some(&json!({"title": "A Paper", "tags": ["ml"], "source": "upload"})),
            )
            .await
            .unwrap();

        h.worker.process_next().await.unwrap().unwrap();

        let chunk = &h.store.list().await.unwrap()[0];
        assert_eq!(chunk.metadata["title"], "A Paper");
        assert_eq!(chunk.metadata["tags"], json!(["ml"]));
        assert_eq!(chunk.metadata["source"], "upload");
        assert_eq!(chunk.metadata["filename"], "a.pdf");
        assert_eq!(chunk.metadata["doc_id"], "a.pdf");
    }

    #[tokio::test]
    async fn test_reingest_trims_stale_chunks() {
        let h = harness().await;
        h.extractor.set("/papers/a.pdf", long_text(10_000));
        h.queue.enqueue("/papers/a.pdf", None).await.unwrap();
        h.worker.process_next().await.unwrap().unwrap();
        assert_eq!(h.store.list().await.unwrap().len(), 3);

        h.extractor.set("/papers/a.pdf", "revised and much shorter".to_string());
        let again = h.queue.enqueue("/papers/a.pdf", None).await.unwrap();
        assert!(again.accepted);
        h.worker.process_next().await.unwrap().unwrap();

        let chunks = h.store.list().await.unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "revised and much shorter");
    }

    #[tokio::test]
    async fn test_store_failure_does_not_stop_later_tasks() {
        let store: Arc<dyn VectorStore> = Arc::new(PickyStore {
            inner: MemoryStore::new(),
        });
        let h = harness_with(FakeEmbedder::new(DIM), store).await;
        h.extractor.set("/papers/bad.pdf", "rejected".to_string());
        h.extractor.set("/papers/good.pdf", "accepted".to_string());
        h.queue.enqueue("/papers/bad.pdf", None).await.unwrap();
        h.queue.enqueue("/papers/good.pdf", None).await.unwrap();

        let (_, first) = h.worker.process_next().await.unwrap().unwrap();
        assert!(matches!(first, TaskOutcome::Failed { reason } if reason.contains("write rejected")));
        let (_, second) = h.worker.process_next().await.unwrap().unwrap();
        assert_eq!(second, TaskOutcome::Completed { chunks: 1 });

        assert!(h.worker.process_next().await.unwrap().is_none());
        let counts = h.queue.status_counts().await.unwrap();
        assert_eq!((counts.completed, counts.failed), (1, 1));
    }

    #[tokio::test]
    async fn test_run_loop_wakes_on_enqueue_and_stops_on_cancel() {
        let h = harness().await;
        h.extractor.set("/papers/a.pdf", "hello".to_string());

        let cancel = CancellationToken::new();
        let wake = Arc::new(Notify::new());
        let worker = h.worker.clone();
        let handle = {
            let cancel = cancel.clone();
            let wake = wake.clone();
            tokio::spawn(async move { worker.run(cancel, wake).await })
        };

        h.queue.enqueue("/papers/a.pdf", None).await.unwrap();
        wake.notify_one();

        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            if h.queue.status_counts().await.unwrap().completed == 1 {
                break;
            }
            assert!(Instant::now() < deadline, "task was not processed in time");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("worker did not stop")
            .unwrap();
    }

    #[test]
    fn test_file_name_of() {
        assert_eq!(file_name_of("/papers/sub/x.pdf"), "x.pdf");
        assert_eq!(file_name_of("y.pdf"), "y.pdf");
    }
}
