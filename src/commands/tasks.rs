//! Queue commands: add, enqueue, tasks, recover

use crate::error::{Error, Result};
use crate::extract::is_pdf;
use crate::library::DEFAULT_FOLDER;
use crate::queue::{QueueStore, QueueTask, TaskStatus};
use crate::store::Metadata;
use crate::watch::find_pdfs;
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Outcome of enqueueing one file
#[derive(Debug, Clone, Serialize)]
pub struct EnqueueReport {
    pub path: String,
    pub task_id: i64,
    /// False when the file already had a pending or processing task
    pub accepted: bool,
}

/// Parse a JSON object given on the command line
pub fn parse_metadata_arg(raw: &str) -> Result<Metadata> {
    match serde_json::from_str::<Value>(raw)? {
        Value::Object(map) => Ok(map),
        other => Err(Error::InvalidMetadata(format!(
            "expected a JSON object, got {}",
            other
        ))),
    }
}

/// Expand a path argument into the PDFs it names
///
/// Directories contribute every PDF below them; files must be PDFs.
async fn expand_path(path: &Path) -> Result<Vec<PathBuf>> {
    let canonical = tokio::fs::canonicalize(path)
        .await
        .map_err(|e| Error::InvalidPath(format!("{}: {}", path.display(), e)))?;

    if canonical.is_dir() {
        let root = canonical.clone();
        let mut pdfs = tokio::task::spawn_blocking(move || find_pdfs(&root))
            .await
            .map_err(|e| Error::InvalidPath(format!("{}: {}", canonical.display(), e)))?;
        pdfs.sort();
        debug!(dir = %canonical.display(), found = pdfs.len(), "Expanded directory");
        return Ok(pdfs);
    }

    if !is_pdf(&canonical) {
        return Err(Error::InvalidPath(format!(
            "{} is not a PDF",
            canonical.display()
        )));
    }
    Ok(vec![canonical])
}

/// Queue PDFs for ingestion, with optional metadata applied to each
pub async fn cmd_enqueue(
    queue: &QueueStore,
    paths: &[PathBuf],
    metadata: Option<&str>,
) -> Result<Vec<EnqueueReport>> {
    let metadata = metadata
        .map(parse_metadata_arg)
        .transpose()?
        .map(Value::Object);

    let mut files = Vec::new();
    for path in paths {
        files.extend(expand_path(path).await?);
    }

    let mut reports = Vec::with_capacity(files.len());
    for file in files {
        let file_path = file.to_string_lossy().to_string();
        let outcome = queue.enqueue(&file_path, metadata.as_ref()).await?;
        reports.push(EnqueueReport {
            path: file_path,
            task_id: outcome.task_id,
            accepted: outcome.accepted,
        });
    }

    info!(
        files = reports.len(),
        accepted = reports.iter().filter(|r| r.accepted).count(),
        "Enqueued files"
    );
    Ok(reports)
}

pub fn print_enqueue_reports(reports: &[EnqueueReport]) {
    println!("\n📥 Enqueue\n");

    if reports.is_empty() {
        println!("No PDFs found.");
        return;
    }

    for report in reports {
        if report.accepted {
            println!("✓ #{} {}", report.task_id, report.path);
        } else {
            println!("• #{} {} (already queued)", report.task_id, report.path);
        }
    }
}

/// Outcome of adding one file to the library
#[derive(Debug, Clone, Serialize)]
pub struct AddReport {
    pub source: String,
    /// Library copy that gets ingested
    pub path: String,
    pub task_id: i64,
    pub accepted: bool,
}

/// Metadata for a newly added paper
///
/// The title falls back to the file name, the folder to `folder_id` or
/// [`DEFAULT_FOLDER`], and `upload_date` is always stamped.
pub fn upload_metadata(filename: &str, supplied: &Metadata, folder_id: Option<&str>) -> Metadata {
    let mut metadata = supplied.clone();

    let has_title = matches!(
        metadata.get("title"),
        Some(Value::String(t)) if !t.trim().is_empty()
    );
    if !has_title {
        metadata.insert("title".to_string(), Value::String(filename.to_string()));
    }

    match folder_id {
        Some(folder) => {
            metadata.insert("folder_id".to_string(), Value::String(folder.to_string()));
        }
        None => {
            metadata
                .entry("folder_id")
                .or_insert_with(|| Value::String(DEFAULT_FOLDER.to_string()));
        }
    }

    metadata.insert(
        "upload_date".to_string(),
        Value::String(Utc::now().to_rfc3339()),
    );
    metadata
}

/// Copy `source` into `library_dir` and queue the copy with `metadata`
///
/// The copy is written under a hidden `.part` name and only renamed into
/// place once its task carries the metadata, so the watcher never queues a
/// bare copy first.
async fn add_file(
    queue: &QueueStore,
    library_dir: &Path,
    source: &Path,
    metadata: &Value,
) -> Result<AddReport> {
    let name = source
        .file_name()
        .ok_or_else(|| Error::InvalidPath(format!("{} has no file name", source.display())))?;
    let dest = library_dir.join(name);
    let already_inside = matches!(
        tokio::fs::canonicalize(&dest).await,
        Ok(existing) if existing == source
    );

    let staged = library_dir.join(format!(".{}.part", name.to_string_lossy()));
    if !already_inside {
        tokio::fs::copy(source, &staged).await?;
    }

    let file_path = dest.to_string_lossy().to_string();
    let outcome = match queue.enqueue(&file_path, Some(metadata)).await {
        Ok(outcome) => outcome,
        Err(e) => {
            if !already_inside {
                if let Err(cleanup) = tokio::fs::remove_file(&staged).await {
                    warn!(path = %staged.display(), error = %cleanup, "Failed to remove staged copy");
                }
            }
            return Err(e);
        }
    };

    if !already_inside {
        tokio::fs::rename(&staged, &dest).await?;
    }
    debug!(source = %source.display(), dest = %dest.display(), "Added paper");

    Ok(AddReport {
        source: source.display().to_string(),
        path: file_path,
        task_id: outcome.task_id,
        accepted: outcome.accepted,
    })
}

/// Copy PDFs into the library directory and queue them for ingestion
///
/// Each paper gets `metadata` completed by [`upload_metadata`].
pub async fn cmd_add(
    queue: &QueueStore,
    library_dir: &Path,
    paths: &[PathBuf],
    metadata: Option<&str>,
    folder_id: Option<&str>,
) -> Result<Vec<AddReport>> {
    let supplied = metadata.map(parse_metadata_arg).transpose()?.unwrap_or_default();

    let mut files = Vec::new();
    for path in paths {
        files.extend(expand_path(path).await?);
    }

    tokio::fs::create_dir_all(library_dir).await?;
    let library_dir = tokio::fs::canonicalize(library_dir).await?;

    let mut reports = Vec::with_capacity(files.len());
    for file in files {
        let filename = file
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let metadata = Value::Object(upload_metadata(&filename, &supplied, folder_id));
        reports.push(add_file(queue, &library_dir, &file, &metadata).await?);
    }

    info!(
        files = reports.len(),
        dir = %library_dir.display(),
        "Added papers"
    );
    Ok(reports)
}

pub fn print_add_reports(reports: &[AddReport]) {
    println!("\n📥 Add\n");

    if reports.is_empty() {
        println!("No PDFs found.");
        return;
    }

    for report in reports {
        if report.accepted {
            println!("✓ #{} {} → {}", report.task_id, report.source, report.path);
        } else {
            println!("• #{} {} (already queued)", report.task_id, report.path);
        }
    }
}

/// Tasks in queue order, optionally filtered by status
pub async fn cmd_tasks(
    queue: &QueueStore,
    status: Option<TaskStatus>,
    limit: usize,
) -> Result<Vec<QueueTask>> {
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    queue.list_tasks(status, limit).await
}

pub fn print_tasks(tasks: &[QueueTask]) {
    println!("\n📋 Tasks\n");

    if tasks.is_empty() {
        println!("No tasks. Use 'papershelf enqueue' or drop PDFs into the watched directory.");
        return;
    }

    for task in tasks {
        println!("#{} [{}] {}", task.id, task.status, task.file_path);
        println!("  Queued: {}  Attempts: {}", task.created_at, task.attempts);
        if let Some(completed_at) = &task.completed_at {
            println!("  Finished: {}", completed_at);
        }
        if let Some(reason) = &task.error_message {
            println!("  Error: {}", reason);
        }
    }
}

/// Return tasks stuck in `processing` to `pending`
pub async fn cmd_recover(queue: &QueueStore) -> Result<u64> {
    queue.recover_abandoned().await
}

pub fn print_recovered(count: u64) {
    if count == 0 {
        println!("No abandoned tasks.");
    } else {
        println!("✓ Returned {} abandoned task(s) to the queue", count);
    }
}
