//! SQLite schema definition

/// SQL schema for the ingestion work queue
pub const SCHEMA_SQL: &str = r#"
-- Processing queue: one row per source PDF
CREATE TABLE IF NOT EXISTS processing_queue (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    file_path TEXT NOT NULL UNIQUE,
    status TEXT NOT NULL DEFAULT 'pending',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    completed_at TEXT,
    error_message TEXT,
    metadata_json TEXT,
    attempts INTEGER NOT NULL DEFAULT 0,
    enqueue_seq INTEGER NOT NULL
);

-- Dequeue scans pending rows in enqueue order
CREATE INDEX IF NOT EXISTS idx_queue_status_seq ON processing_queue(status, enqueue_seq);
"#;
