use async_trait::async_trait;
use common::domain::{DomainError, DomainResult, FailedRecord, FailureQueue};
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;

/// Failure queue backed by a JSON Lines file: one record per line, UTF-8, append-only.
///
/// The file is opened in append mode for every record so an external reprocessor
/// may move it away between appends. The lock keeps concurrent appends from interleaving.
pub struct JsonlFailureQueue {
    path: PathBuf,
    append_lock: Mutex<()>,
}

impl JsonlFailureQueue {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            append_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Serialize a record as a single newline-terminated line
pub fn encode_record(record: &FailedRecord) -> DomainResult<Vec<u8>> {
    let mut line = serde_json::to_vec(record)
        .map_err(|e| DomainError::SerializationError(e.to_string()))?;
    line.push(b'\n');
    Ok(line)
}

#[async_trait]
impl FailureQueue for JsonlFailureQueue {
    async fn append(&self, record: &FailedRecord) -> DomainResult<()> {
        let line = encode_record(record)?;

        let _guard = self.append_lock.lock().await;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                DomainError::QueueError(format!("cannot create {}: {}", parent.display(), e))
            })?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| {
                DomainError::QueueError(format!("cannot open {}: {}", self.path.display(), e))
            })?;

        file.write_all(&line)
            .await
            .map_err(|e| DomainError::QueueError(format!("append failed: {}", e)))?;
        file.sync_data()
            .await
            .map_err(|e| DomainError::QueueError(format!("sync failed: {}", e)))?;

        debug!(path = %self.path.display(), bytes = line.len(), "appended failed record");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use common::domain::NormalizedDocument;
    use serde_json::{json, Map, Value};
    use std::sync::Arc;

    fn record(seq: u64) -> FailedRecord {
        let mut fields = Map::new();
        fields.insert("topic".to_string(), json!("aiotgarage/hall/cam1/presence"));
        fields.insert("seq".to_string(), json!(seq));
        fields.insert("note".to_string(), json!("ääkköset"));
        FailedRecord::new(
            "presence_db",
            "presence",
            NormalizedDocument::new(fields),
            "Repository error: timed out",
            Utc::now(),
        )
    }

    fn read_lines(path: &Path) -> Vec<Value> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_append_writes_one_line_with_full_addressing() {
        let dir = tempfile::tempdir().unwrap();
        let queue = JsonlFailureQueue::new(dir.path().join("failed_queue.jsonl"));

        queue.append(&record(1)).await.unwrap();

        let lines = read_lines(queue.path());
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["db"], "presence_db");
        assert_eq!(lines[0]["coll"], "presence");
        assert_eq!(lines[0]["document"]["seq"], 1);
        assert_eq!(lines[0]["document"]["note"], "ääkköset");
        assert_eq!(lines[0]["error"], "Repository error: timed out");
    }

    #[tokio::test]
    async fn test_appends_preserve_order_and_existing_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("failed_queue.jsonl");
        std::fs::write(&path, "{\"existing\":true}\n").unwrap();
        let queue = JsonlFailureQueue::new(&path);

        queue.append(&record(1)).await.unwrap();
        queue.append(&record(2)).await.unwrap();

        let lines = read_lines(&path);
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0]["existing"], true);
        assert_eq!(lines[1]["document"]["seq"], 1);
        assert_eq!(lines[2]["document"]["seq"], 2);
    }

    #[tokio::test]
    async fn test_concurrent_appends_do_not_interleave() {
        let dir = tempfile::tempdir().unwrap();
        let queue = Arc::new(JsonlFailureQueue::new(dir.path().join("q.jsonl")));

        let mut handles = Vec::new();
        for seq in 0..50 {
            let queue = queue.clone();
            handles.push(tokio::spawn(async move { queue.append(&record(seq)).await }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let lines = read_lines(queue.path());
        assert_eq!(lines.len(), 50);
    }

    #[tokio::test]
    async fn test_creates_missing_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let queue = JsonlFailureQueue::new(dir.path().join("outbox/nested/failed.jsonl"));

        queue.append(&record(1)).await.unwrap();

        assert_eq!(read_lines(queue.path()).len(), 1);
    }

    #[tokio::test]
    async fn test_unwritable_location_reports_queue_error() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where the file should be makes the open fail
        let queue = JsonlFailureQueue::new(dir.path());

        let result = queue.append(&record(1)).await;

        assert!(matches!(result, Err(DomainError::QueueError(_))));
    }

    #[test]
    fn test_encode_record_is_single_line() {
        let line = encode_record(&record(9)).unwrap();

        assert_eq!(line.last(), Some(&b'\n'));
        assert_eq!(line.iter().filter(|b| **b == b'\n').count(), 1);
    }
}
