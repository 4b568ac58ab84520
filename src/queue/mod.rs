//! Durable ingestion work queue backed by SQLite
//!
//! Each source PDF owns at most one row, keyed by its path. A row moves
//! `pending → processing → {completed | failed}` and is reused (reset to
//! `pending`) when the same path is enqueued again after a terminal state.
//!
//! All writes in this process are serialized through one async mutex and
//! committed before the call returns.

mod schema;

pub use schema::*;

use crate::config::Config;
use crate::error::{Error, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Task status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 4] = [
        TaskStatus::Pending,
        TaskStatus::Processing,
        TaskStatus::Completed,
        TaskStatus::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Processing => "processing",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(TaskStatus::Pending),
            "processing" => Ok(TaskStatus::Processing),
            "completed" => Ok(TaskStatus::Completed),
            "failed" => Ok(TaskStatus::Failed),
            _ => Err(Error::Config(format!("Unknown task status: {}", s))),
        }
    }
}

/// One ingestion task
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct QueueTask {
    pub id: i64,
    pub file_path: String,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
    pub completed_at: Option<String>,
    pub error_message: Option<String>,
    pub metadata_json: Option<String>,
    pub attempts: i64,
    pub enqueue_seq: i64,
}

impl QueueTask {
    pub fn task_status(&self) -> Result<TaskStatus> {
        self.status.parse()
    }

    /// Caller-supplied metadata, if any was stored with the task
    pub fn metadata(&self) -> Result<Option<serde_json::Map<String, serde_json::Value>>> {
        match self.metadata_json.as_deref() {
            None => Ok(None),
            Some(raw) => Ok(Some(serde_json::from_str(raw)?)),
        }
    }
}

/// Result of an enqueue call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EnqueueOutcome {
    /// False when the path already had a pending or processing task
    pub accepted: bool,
    pub task_id: i64,
}

/// Number of tasks per status; every status is always present
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub pending: u64,
    pub processing: u64,
    pub completed: u64,
    pub failed: u64,
}

impl StatusCounts {
    pub fn get(&self, status: TaskStatus) -> u64 {
        match status {
            TaskStatus::Pending => self.pending,
            TaskStatus::Processing => self.processing,
            TaskStatus::Completed => self.completed,
            TaskStatus::Failed => self.failed,
        }
    }

    fn slot(&mut self, status: TaskStatus) -> &mut u64 {
        match status {
            TaskStatus::Pending => &mut self.pending,
            TaskStatus::Processing => &mut self.processing,
            TaskStatus::Completed => &mut self.completed,
            TaskStatus::Failed => &mut self.failed,
        }
    }

    pub fn total(&self) -> u64 {
        self.pending + self.processing + self.completed + self.failed
    }
}

/// Work queue handle
#[derive(Clone)]
pub struct QueueStore {
    pool: SqlitePool,
    write_lock: Arc<Mutex<()>>,
}

impl QueueStore {
    /// Connect to the queue database configured for this process
    pub async fn connect(config: &Config) -> Result<Self> {
        Self::open(&config.paths.queue_db_file).await
    }

    /// Open (creating if needed) the queue database at `db_path` and initialize its schema
    pub async fn open(db_path: &Path) -> Result<Self> {
        // Create parent directory if needed
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Full);

        debug!("Connecting to queue database at {:?}", db_path);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let queue = Self {
            pool,
            write_lock: Arc::new(Mutex::new(())),
        };
        queue.init_schema().await?;
        Ok(queue)
    }

    /// Initialize the database schema
    pub async fn init_schema(&self) -> Result<()> {
        sqlx::query(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    // ===== Producer Operations =====

    /// Enqueue a file for ingestion
    ///
    /// A path with a live (`pending` or `processing`) task is not queued again.
    /// Supplied metadata still replaces that of a `pending` task. A path whose
    /// task already finished gets its row reset to `pending` at the back of
    /// the queue.
    pub async fn enqueue(
        &self,
        file_path: &str,
        metadata: Option<&serde_json::Value>,
    ) -> Result<EnqueueOutcome> {
        let metadata_json = metadata.map(serde_json::to_string).transpose()?;
        let now = Utc::now().to_rfc3339();

        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;

        let inserted = insert_new(&mut tx, file_path, metadata_json.as_deref(), &now).await?;
        if let Some(task_id) = inserted {
            tx.commit().await?;
            debug!(task_id, file_path, "Enqueued new task");
            return Ok(EnqueueOutcome {
                accepted: true,
                task_id,
            });
        }

        let existing: (i64, String) =
            sqlx::query_as("SELECT id, status FROM processing_queue WHERE file_path = ?")
                .bind(file_path)
                .fetch_one(&mut *tx)
                .await?;
        let (task_id, status) = existing;

        let accepted = match status.parse::<TaskStatus>()? {
            TaskStatus::Pending => {
                if metadata_json.is_some() {
                    sqlx::query(
                        "UPDATE processing_queue SET metadata_json = ?, updated_at = ? WHERE id = ?",
                    )
                    .bind(&metadata_json)
                    .bind(&now)
                    .bind(task_id)
                    .execute(&mut *tx)
                    .await?;
                }
                false
            }
            TaskStatus::Processing => false,
            TaskStatus::Completed | TaskStatus::Failed => {
                sqlx::query(
                    r#"
                    UPDATE processing_queue
                    SET status = 'pending',
                        created_at = ?,
                        updated_at = ?,
                        completed_at = NULL,
                        error_message = NULL,
                        metadata_json = COALESCE(?, metadata_json),
                        enqueue_seq = (SELECT COALESCE(MAX(enqueue_seq), 0) + 1 FROM processing_queue)
                    WHERE id = ?
                    "#,
                )
                .bind(&now)
                .bind(&now)
                .bind(&metadata_json)
                .bind(task_id)
                .execute(&mut *tx)
                .await?;
                true
            }
        };

        tx.commit().await?;
        debug!(task_id, file_path, accepted, previous = %status, "Enqueue on existing task");
        Ok(EnqueueOutcome { accepted, task_id })
    }

    /// Enqueue a file only when the queue has never seen its path
    ///
    /// Any existing row, whatever its status, counts as tracked and is left
    /// untouched. Directory sweeps use this so finished and failed tasks are
    /// not picked up again on every start.
    pub async fn enqueue_if_untracked(&self, file_path: &str) -> Result<EnqueueOutcome> {
        let now = Utc::now().to_rfc3339();

        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;

        let accepted = insert_new(&mut tx, file_path, None, &now).await?;
        let task_id = match accepted {
            Some(id) => id,
            None => {
                let (id,): (i64,) =
                    sqlx::query_as("SELECT id FROM processing_queue WHERE file_path = ?")
                        .bind(file_path)
                        .fetch_one(&mut *tx)
                        .await?;
                id
            }
        };
        tx.commit().await?;

        Ok(EnqueueOutcome {
            accepted: accepted.is_some(),
            task_id,
        })
    }

    // ===== Consumer Operations =====

    /// Atomically claim the oldest pending task, moving it to `processing`
    pub async fn dequeue_next(&self) -> Result<Option<QueueTask>> {
        let now = Utc::now().to_rfc3339();
        let _guard = self.write_lock.lock().await;

        let task = sqlx::query_as::<_, QueueTask>(
            r#"
            UPDATE processing_queue
            SET status = 'processing', attempts = attempts + 1, updated_at = ?
            WHERE id = (
                SELECT id FROM processing_queue
                WHERE status = 'pending'
                ORDER BY enqueue_seq
                LIMIT 1
            ) AND status = 'pending'
            RETURNING *
            "#,
        )
        .bind(&now)
        .fetch_optional(&self.pool)
        .await?;

        Ok(task)
    }

    /// Mark a processing task as completed
    pub async fn mark_completed(&self, id: i64) -> Result<()> {
        self.finish(id, TaskStatus::Completed, None).await
    }

    /// Mark a processing task as failed, recording the reason
    pub async fn mark_failed(&self, id: i64, reason: &str) -> Result<()> {
        self.finish(id, TaskStatus::Failed, Some(reason)).await
    }

    async fn finish(&self, id: i64, to: TaskStatus, reason: Option<&str>) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;

        let current: Option<(String,)> =
            sqlx::query_as("SELECT status FROM processing_queue WHERE id = ?")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        let from = match current {
            Some((status,)) => status.parse::<TaskStatus>()?,
            None => return Err(Error::TaskNotFound(id)),
        };

        // Re-marking a terminal task with the same status overwrites it
        if from != TaskStatus::Processing && from != to {
            return Err(Error::InvalidTransition { id, from, to });
        }

        sqlx::query(
            r#"
            UPDATE processing_queue
            SET status = ?, updated_at = ?, completed_at = ?, error_message = ?
            WHERE id = ?
            "#,
        )
        .bind(to.as_str())
        .bind(&now)
        .bind(&now)
        .bind(reason)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Reset tasks stuck in `processing` (left by a crashed run) to `pending`
    pub async fn recover_abandoned(&self) -> Result<u64> {
        let now = Utc::now().to_rfc3339();
        let _guard = self.write_lock.lock().await;

        let result = sqlx::query(
            "UPDATE processing_queue SET status = 'pending', updated_at = ? WHERE status = 'processing'",
        )
        .bind(&now)
        .execute(&self.pool)
        .await?;

        let recovered = result.rows_affected();
        if recovered > 0 {
            info!(recovered, "Reset abandoned tasks to pending");
        }
        Ok(recovered)
    }

    // ===== Read Operations =====

    /// Count tasks per status
    pub async fn status_counts(&self) -> Result<StatusCounts> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM processing_queue GROUP BY status")
                .fetch_all(&self.pool)
                .await?;

        let mut counts = StatusCounts::default();
        for (status, count) in rows {
            *counts.slot(status.parse()?) = count as u64;
        }
        Ok(counts)
    }

    /// Get task by ID
    pub async fn get_task(&self, id: i64) -> Result<Option<QueueTask>> {
        let task = sqlx::query_as::<_, QueueTask>("SELECT * FROM processing_queue WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(task)
    }

    /// Get task by file path
    pub async fn get_task_by_path(&self, file_path: &str) -> Result<Option<QueueTask>> {
        let task =
            sqlx::query_as::<_, QueueTask>("SELECT * FROM processing_queue WHERE file_path = ?")
                .bind(file_path)
                .fetch_optional(&self.pool)
                .await?;
        Ok(task)
    }

    /// List tasks in queue order, optionally filtered by status
    pub async fn list_tasks(&self, status: Option<TaskStatus>, limit: i64) -> Result<Vec<QueueTask>> {
        let tasks = match status {
            Some(status) => {
                sqlx::query_as::<_, QueueTask>(
                    "SELECT * FROM processing_queue WHERE status = ? ORDER BY enqueue_seq LIMIT ?",
                )
                .bind(status.as_str())
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, QueueTask>(
                    "SELECT * FROM processing_queue ORDER BY enqueue_seq LIMIT ?",
                )
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
        };
        Ok(tasks)
    }
}

/// Insert a fresh `pending` row at the back of the queue; `None` when the path already has a row
async fn insert_new(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    file_path: &str,
    metadata_json: Option<&str>,
    now: &str,
) -> Result<Option<i64>> {
    let inserted: Option<(i64,)> = sqlx::query_as(
        r#"
        INSERT INTO processing_queue
            (file_path, status, created_at, updated_at, metadata_json, attempts, enqueue_seq)
        VALUES (?, 'pending', ?, ?, ?, 0,
            (SELECT COALESCE(MAX(enqueue_seq), 0) + 1 FROM processing_queue))
        ON CONFLICT(file_path) DO NOTHING
        RETURNING id
        "#,
    )
    .bind(file_path)
    .bind(now)
    .bind(now)
    .bind(metadata_json)
    .fetch_optional(&mut **tx)
    .await?;
    Ok(inserted.map(|(id,)| id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashSet;
    use tempfile::TempDir;

    async fn setup_test_queue() -> (QueueStore, TempDir) {
        let tmp = TempDir::new().unwrap();
        let queue = QueueStore::open(&tmp.path().join("queue.db")).await.unwrap();
        (queue, tmp)
    }

    #[tokio::test]
    async fn test_enqueue_new_and_duplicate() {
        let (queue, _tmp) = setup_test_queue().await;

        let first = queue.enqueue("/papers/a.pdf", None).await.unwrap();
        assert!(first.accepted);

        let second = queue.enqueue("/papers/a.pdf", None).await.unwrap();
        assert!(!second.accepted);
        assert_eq!(first.task_id, second.task_id);

        let counts = queue.status_counts().await.unwrap();
        assert_eq!(counts.pending, 1);
        assert_eq!(counts.total(), 1);
    }

    #[tokio::test]
    async fn test_pending_duplicate_overwrites_metadata() {
        let (queue, _tmp) = setup_test_queue().await;

        queue
            .enqueue("/papers/a.pdf", Some(&json!({"title": "Draft"})))
            .await
            .unwrap();
        let outcome = queue
            .enqueue("/papers/a.pdf", Some(&json!({"title": "Final"})))
            .await
            .unwrap();
        assert!(!outcome.accepted);

        // No metadata on a duplicate leaves the stored metadata alone
        queue.enqueue("/papers/a.pdf", None).await.unwrap();

        let task = queue.get_task(outcome.task_id).await.unwrap().unwrap();
        let metadata = task.metadata().unwrap().unwrap();
        assert_eq!(metadata["title"], "Final");
    }

    #[tokio::test]
    async fn test_processing_duplicate_is_rejected() {
        let (queue, _tmp) = setup_test_queue().await;

        queue.enqueue("/papers/a.pdf", None).await.unwrap();
        let task = queue.dequeue_next().await.unwrap().unwrap();

        let outcome = queue
            .enqueue("/papers/a.pdf", Some(&json!({"title": "Late"})))
            .await
            .unwrap();
        assert!(!outcome.accepted);

        let reloaded = queue.get_task(task.id).await.unwrap().unwrap();
        assert_eq!(reloaded.task_status().unwrap(), TaskStatus::Processing);
        assert!(reloaded.metadata_json.is_none());
    }

    #[tokio::test]
    async fn test_dequeue_fifo_order() {
        let (queue, _tmp) = setup_test_queue().await;

        for name in ["a", "b", "c"] {
            queue.enqueue(&format!("/papers/{name}.pdf"), None).await.unwrap();
        }

        let order: Vec<String> = {
            let mut paths = Vec::new();
            while let Some(task) = queue.dequeue_next().await.unwrap() {
                assert_eq!(task.attempts, 1);
                paths.push(task.file_path);
            }
            paths
        };
        assert_eq!(order, vec!["/papers/a.pdf", "/papers/b.pdf", "/papers/c.pdf"]);

        let counts = queue.status_counts().await.unwrap();
        assert_eq!(counts.processing, 3);
        assert_eq!(counts.pending, 0);
    }

    #[tokio::test]
    async fn test_concurrent_dequeue_claims_each_task_once() {
        let (queue, _tmp) = setup_test_queue().await;

        for i in 0..20 {
            queue.enqueue(&format!("/papers/{i}.pdf"), None).await.unwrap();
        }

        let mut handles = Vec::new();
        for _ in 0..8 {
            let queue = queue.clone();
            handles.push(tokio::spawn(async move {
                let mut claimed = Vec::new();
                while let Some(task) = queue.dequeue_next().await.unwrap() {
                    claimed.push(task.id);
                }
                claimed
            }));
        }

        let mut all = Vec::new();
        for handle in handles {
            all.extend(handle.await.unwrap());
        }
        let unique: HashSet<i64> = all.iter().copied().collect();
        assert_eq!(all.len(), 20);
        assert_eq!(unique.len(), 20);
    }

    #[tokio::test]
    async fn test_terminal_transitions() {
        let (queue, _tmp) = setup_test_queue().await;

        queue.enqueue("/papers/a.pdf", None).await.unwrap();
        queue.enqueue("/papers/b.pdf", None).await.unwrap();
        let a = queue.dequeue_next().await.unwrap().unwrap();
        let b = queue.dequeue_next().await.unwrap().unwrap();

        queue.mark_completed(a.id).await.unwrap();
        queue.mark_failed(b.id, "no text layer").await.unwrap();

        let a = queue.get_task(a.id).await.unwrap().unwrap();
        assert_eq!(a.task_status().unwrap(), TaskStatus::Completed);
        assert!(a.completed_at.is_some());

        let b = queue.get_task(b.id).await.unwrap().unwrap();
        assert_eq!(b.task_status().unwrap(), TaskStatus::Failed);
        assert_eq!(b.error_message.as_deref(), Some("no text layer"));

        // Same terminal status again is an overwrite
        queue.mark_failed(b.id, "still no text layer").await.unwrap();

        // Crossing between terminal states is rejected
        let err = queue.mark_failed(a.id, "oops").await.unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidTransition {
                from: TaskStatus::Completed,
                to: TaskStatus::Failed,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_mark_pending_task_is_rejected() {
        let (queue, _tmp) = setup_test_queue().await;

        let outcome = queue.enqueue("/papers/a.pdf", None).await.unwrap();
        let err = queue.mark_completed(outcome.task_id).await.unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidTransition {
                from: TaskStatus::Pending,
                ..
            }
        ));

        let err = queue.mark_completed(9999).await.unwrap_err();
        assert!(matches!(err, Error::TaskNotFound(9999)));
    }

    #[tokio::test]
    async fn test_reenqueue_after_completion_goes_to_back() {
        let (queue, _tmp) = setup_test_queue().await;

        queue
            .enqueue("/papers/a.pdf", Some(&json!({"title": "A"})))
            .await
            .unwrap();
        let a = queue.dequeue_next().await.unwrap().unwrap();
        queue.mark_failed(a.id, "boom").await.unwrap();

        queue.enqueue("/papers/b.pdf", None).await.unwrap();
        let again = queue.enqueue("/papers/a.pdf", None).await.unwrap();
        assert!(again.accepted);
        assert_eq!(again.task_id, a.id);

        let reset = queue.get_task(a.id).await.unwrap().unwrap();
        assert_eq!(reset.task_status().unwrap(), TaskStatus::Pending);
        assert!(reset.error_message.is_none());
        assert!(reset.completed_at.is_none());
        // Metadata survives when the re-enqueue supplies none
        assert_eq!(reset.metadata().unwrap().unwrap()["title"], "A");

        let next = queue.dequeue_next().await.unwrap().unwrap();
        assert_eq!(next.file_path, "/papers/b.pdf");
        let last = queue.dequeue_next().await.unwrap().unwrap();
        assert_eq!(last.file_path, "/papers/a.pdf");
        assert_eq!(last.attempts, 2);
    }

    #[tokio::test]
    async fn test_enqueue_if_untracked_leaves_existing_rows_alone() {
        let (queue, _tmp) = setup_test_queue().await;

        let fresh = queue.enqueue_if_untracked("/papers/a.pdf").await.unwrap();
        assert!(fresh.accepted);
        queue.enqueue_if_untracked("/papers/b.pdf").await.unwrap();

        let a = queue.dequeue_next().await.unwrap().unwrap();
        queue.mark_completed(a.id).await.unwrap();
        let b = queue.dequeue_next().await.unwrap().unwrap();
        queue.mark_failed(b.id, "bad pdf").await.unwrap();

        for (path, id) in [("/papers/a.pdf", a.id), ("/papers/b.pdf", b.id)] {
            let outcome = queue.enqueue_if_untracked(path).await.unwrap();
            assert!(!outcome.accepted);
            assert_eq!(outcome.task_id, id);
        }

        let counts = queue.status_counts().await.unwrap();
        assert_eq!(counts.completed, 1);
        assert_eq!(counts.failed, 1);
        assert_eq!(counts.pending, 0);

        let failed = queue.get_task(b.id).await.unwrap().unwrap();
        assert_eq!(failed.error_message.as_deref(), Some("bad pdf"));
    }

    #[tokio::test]
    async fn test_status_counts_always_has_every_status() {
        let (queue, _tmp) = setup_test_queue().await;

        let counts = queue.status_counts().await.unwrap();
        for status in TaskStatus::ALL {
            assert_eq!(counts.get(status), 0);
        }

        let json = serde_json::to_value(counts).unwrap();
        for status in TaskStatus::ALL {
            assert_eq!(json[status.as_str()], 0);
        }
    }

    #[tokio::test]
    async fn test_recover_abandoned() {
        let (queue, _tmp) = setup_test_queue().await;

        queue.enqueue("/papers/a.pdf", None).await.unwrap();
        queue.dequeue_next().await.unwrap().unwrap();

        assert_eq!(queue.recover_abandoned().await.unwrap(), 1);
        let counts = queue.status_counts().await.unwrap();
        assert_eq!(counts.pending, 1);
        assert_eq!(counts.processing, 0);
    }

    #[tokio::test]
    async fn test_queue_survives_reopen() {
        let tmp = TempDir::new().unwrap();
        let db_path = tmp.path().join("queue.db");

        {
            let queue = QueueStore::open(&db_path).await.unwrap();
            queue.enqueue("/papers/a.pdf", None).await.unwrap();
            queue.enqueue("/papers/b.pdf", None).await.unwrap();
            let task = queue.dequeue_next().await.unwrap().unwrap();
            queue.mark_completed(task.id).await.unwrap();
        }

        let queue = QueueStore::open(&db_path).await.unwrap();
        let counts = queue.status_counts().await.unwrap();
        assert_eq!(counts.completed, 1);
        assert_eq!(counts.pending, 1);

        let pending = queue
            .list_tasks(Some(TaskStatus::Pending), 10)
            .await
            .unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].file_path, "/papers/b.pdf");
        assert!(queue.get_task_by_path("/papers/a.pdf").await.unwrap().is_some());
    }
}
