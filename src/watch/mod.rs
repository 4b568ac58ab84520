//! Filesystem watcher feeding the work queue
//!
//! The OS watcher runs on its own thread and forwards events over a channel
//! to a tokio task, which enqueues every PDF that is created in (or moved
//! into) the watched tree. A startup sweep enqueues PDFs that were already
//! there; the queue absorbs the duplicates this produces.

use crate::error::{Error, Result};
use crate::extract::is_pdf;
use crate::queue::QueueStore;
use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

pub struct DirectoryWatcher {
    root: PathBuf,
    watcher: Option<RecommendedWatcher>,
    forwarder: Option<JoinHandle<()>>,
}

impl DirectoryWatcher {
    /// Watch `root` recursively, creating it if missing
    ///
    /// With `sweep` set, PDFs already under `root` are enqueued once the
    /// watch is in place.
    pub async fn start(
        root: &Path,
        queue: QueueStore,
        wake: Arc<Notify>,
        sweep: bool,
    ) -> Result<Self> {
        std::fs::create_dir_all(root)?;
        let root = std::fs::canonicalize(root)?;

        let (tx, mut rx) = mpsc::unbounded_channel::<notify::Result<Event>>();
        let mut watcher = notify::recommended_watcher(move |res| {
            // The receiver only goes away during shutdown
            let _ = tx.send(res);
        })?;
        watcher.watch(&root, RecursiveMode::Recursive)?;
        info!(root = %root.display(), "Watching directory for PDFs");

        let forward_queue = queue.clone();
        let forward_wake = wake.clone();
        let forwarder = tokio::spawn(async move {
            while let Some(res) = rx.recv().await {
                match res {
                    Ok(event) => {
                        for path in candidate_paths(&event) {
                            if path.is_dir() {
                                if let Err(e) =
                                    sweep_directory(&path, &forward_queue, &forward_wake).await
                                {
                                    warn!(path = %path.display(), error = %e, "Failed to scan new directory");
                                }
                            } else if is_pdf(&path) {
                                enqueue_path(&forward_queue, &forward_wake, &path, EnqueueMode::Arrival)
                                    .await;
                            }
                        }
                    }
                    Err(e) => warn!(error = %e, "Watcher error"),
                }
            }
            debug!("Watcher event channel closed");
        });

        if sweep {
            let accepted = sweep_directory(&root, &queue, &wake).await?;
            info!(accepted, "Startup sweep complete");
        }

        Ok(Self {
            root,
            watcher: Some(watcher),
            forwarder: Some(forwarder),
        })
    }

    /// Canonical path of the watched root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Stop watching and wait for already-received events to be enqueued
    pub async fn stop(mut self) {
        // Dropping the watcher drops the sender, which ends the forwarding loop
        self.watcher.take();
        if let Some(handle) = self.forwarder.take() {
            if let Err(e) = handle.await {
                warn!(error = %e, "Watcher forwarding task ended abnormally");
            }
        }
        info!(root = %self.root.display(), "Stopped watching directory");
    }
}

/// Paths an event introduces into the tree
fn candidate_paths(event: &Event) -> Vec<PathBuf> {
    match event.kind {
        EventKind::Create(_) => event.paths.clone(),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => event.paths.clone(),
        // [from, to]
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            event.paths.last().cloned().into_iter().collect()
        }
        // Platforms that cannot tell the two sides of a rename apart
        EventKind::Modify(ModifyKind::Name(RenameMode::Any)) => {
            event.paths.iter().filter(|p| p.exists()).cloned().collect()
        }
        _ => Vec::new(),
    }
}

/// How a path reaches the queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EnqueueMode {
    /// A file that just arrived; a finished task for the same path is queued again
    Arrival,
    /// A file found by a sweep; any existing task means it is already tracked
    Sweep,
}

async fn enqueue_path(queue: &QueueStore, wake: &Notify, path: &Path, mode: EnqueueMode) -> bool {
    let file_path = path.to_string_lossy();
    let result = match mode {
        EnqueueMode::Arrival => queue.enqueue(&file_path, None).await,
        EnqueueMode::Sweep => queue.enqueue_if_untracked(&file_path).await,
    };
    match result {
        Ok(outcome) if outcome.accepted => {
            info!(task_id = outcome.task_id, path = %file_path, "Queued PDF");
            wake.notify_one();
            true
        }
        Ok(outcome) => {
            debug!(task_id = outcome.task_id, path = %file_path, "PDF already queued");
            false
        }
        Err(e) => {
            warn!(path = %file_path, error = %e, "Failed to queue PDF");
            false
        }
    }
}

/// Every PDF file under `root`, following symlinks
///
/// Blocking; unreadable entries are logged and skipped.
pub fn find_pdfs(root: &Path) -> Vec<PathBuf> {
    WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(error = %e, "Skipping unreadable entry");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file() && is_pdf(entry.path()))
        .map(|entry| entry.into_path())
        .collect()
}

/// Enqueue every PDF under `root` that the queue has not seen, returning how many were accepted
///
/// Paths with a task in any status are skipped, so finished and failed
/// tasks stay as they are.
pub async fn sweep_directory(root: &Path, queue: &QueueStore, wake: &Notify) -> Result<usize> {
    let walk_root = root.to_path_buf();
    let pdfs = tokio::task::spawn_blocking(move || find_pdfs(&walk_root))
        .await
        .map_err(|e| Error::InvalidPath(format!("{}: {}", root.display(), e)))?;

    let mut accepted = 0;
    for path in pdfs {
        if enqueue_path(queue, wake, &path, EnqueueMode::Sweep).await {
            accepted += 1;
        }
    }
    Ok(accepted)
}
