use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// File name of the request log inside the configured log directory
pub const REQUEST_LOG_FILE: &str = "requests.log";

/// Errors raised while appending to the request log
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("request log I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize request entry: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("request log is closed")]
    Closed,

    #[error("request log lock poisoned")]
    Poisoned,
}

/// Outcome of a single tool invocation. Flattened into the entry so exactly
/// one of `result` / `error` appears on each line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Result(serde_json::Value),
    Error(String),
}

/// One line of the request log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestEntry {
    pub timestamp: DateTime<Utc>,
    pub tool_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(flatten)]
    pub outcome: Outcome,
}

impl RequestEntry {
    pub fn success(tool_name: &str, session_id: &str, result: serde_json::Value) -> Self {
        Self {
            timestamp: Utc::now(),
            tool_name: tool_name.to_string(),
            session_id: session_id.to_string(),
            request_id: None,
            outcome: Outcome::Result(result),
        }
    }

    pub fn failure(tool_name: &str, session_id: &str, error: &str) -> Self {
        Self {
            timestamp: Utc::now(),
            tool_name: tool_name.to_string(),
            session_id: session_id.to_string(),
            request_id: None,
            outcome: Outcome::Error(error.to_string()),
        }
    }
}

/// Write-only audit trail of tool invocations
///
/// Implementations must be safe to call from many tasks at once; callers do
/// no locking of their own.
pub trait RequestStore: Send + Sync {
    /// Record a successful invocation and its structured payload
    fn record_success(
        &self,
        tool_name: &str,
        session_id: &str,
        result: serde_json::Value,
    ) -> Result<(), StoreError>;

    /// Record a failed invocation
    fn record_failure(&self, tool_name: &str, session_id: &str, error: &str)
        -> Result<(), StoreError>;
}

/// Request log in JSONL (JSON Lines) format, one entry per line
///
/// Every append is flushed before the lock is released; the file is safe to
/// tail while the process runs.
pub struct JsonlRequestStore {
    path: PathBuf,
    writer: Mutex<Option<BufWriter<File>>>,
}

impl JsonlRequestStore {
    /// Open (or create) `requests.log` inside `dir` in append mode
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;

        let path = dir.join(REQUEST_LOG_FILE);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        tracing::debug!(path = %path.display(), "opened request log");

        Ok(Self {
            path,
            writer: Mutex::new(Some(BufWriter::new(file))),
        })
    }

    /// Path of the underlying log file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a single entry
    pub fn append(&self, entry: &RequestEntry) -> Result<(), StoreError> {
        let mut line = serde_json::to_vec(entry)?;
        line.push(b'\n');

        let mut guard = self.writer.lock().map_err(|_| StoreError::Poisoned)?;
        let writer = guard.as_mut().ok_or(StoreError::Closed)?;

        writer.write_all(&line)?;
        writer.flush()?;

        Ok(())
    }

    /// Flush and release the file. Closing an already closed store is a no-op.
    pub fn close(&self) -> Result<(), StoreError> {
        let mut guard = self.writer.lock().map_err(|_| StoreError::Poisoned)?;
        let Some(mut writer) = guard.take() else {
            return Ok(());
        };

        writer.flush()?;
        writer.get_ref().sync_all()?;

        tracing::debug!(path = %self.path.display(), "closed request log");
        Ok(())
    }
}

impl RequestStore for JsonlRequestStore {
    fn record_success(
        &self,
        tool_name: &str,
        session_id: &str,
        result: serde_json::Value,
    ) -> Result<(), StoreError> {
        self.append(&RequestEntry::success(tool_name, session_id, result))
    }

    fn record_failure(
        &self,
        tool_name: &str,
        session_id: &str,
        error: &str,
    ) -> Result<(), StoreError> {
        self.append(&RequestEntry::failure(tool_name, session_id, error))
    }
}

impl Drop for JsonlRequestStore {
    fn drop(&mut self) {
        if let Ok(mut guard) = self.writer.lock() {
            if let Some(writer) = guard.as_mut() {
                let _ = writer.flush();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn read_lines(path: &Path) -> Vec<String> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_success_entry_format() {
        let temp_dir = TempDir::new().unwrap();
        let store = JsonlRequestStore::open(temp_dir.path()).unwrap();

        store
            .record_success(
                "nodeinfo",
                "sess-42",
                serde_json::json!({"node_info": {"hostname": "node-1", "internal_ip": "10.0.0.5"}}),
            )
            .unwrap();

        let lines = read_lines(store.path());
        assert_eq!(lines.len(), 1);

        let value: serde_json::Value = serde_json::from_str(&lines[0]).unwrap();
        assert_eq!(value["tool_name"], "nodeinfo");
        assert_eq!(value["session_id"], "sess-42");
        assert_eq!(value["result"]["node_info"]["hostname"], "node-1");
        assert_eq!(value["result"]["node_info"]["internal_ip"], "10.0.0.5");
        assert!(value.get("error").is_none());
        assert!(value.get("request_id").is_none());

        let timestamp = value["timestamp"].as_str().unwrap();
        assert!(DateTime::parse_from_rfc3339(timestamp).is_ok());
    }

    #[test]
    fn test_failure_entry_omits_empty_session() {
        let temp_dir = TempDir::new().unwrap();
        let store = JsonlRequestStore::open(temp_dir.path()).unwrap();

        store.record_failure("nodeinfo", "", "boom").unwrap();

        let lines = read_lines(store.path());
        let value: serde_json::Value = serde_json::from_str(&lines[0]).unwrap();
        assert_eq!(value["error"], "boom");
        assert!(value.get("result").is_none());
        assert!(value.get("session_id").is_none());

        let entry: RequestEntry = serde_json::from_str(&lines[0]).unwrap();
        assert_eq!(entry.outcome, Outcome::Error("boom".to_string()));
        assert_eq!(entry.session_id, "");
    }

    #[test]
    fn test_reopen_appends() {
        let temp_dir = TempDir::new().unwrap();

        let store = JsonlRequestStore::open(temp_dir.path()).unwrap();
        store.record_failure("a", "s", "first").unwrap();
        store.close().unwrap();

        let store = JsonlRequestStore::open(temp_dir.path()).unwrap();
        store.record_failure("b", "s", "second").unwrap();
        store.close().unwrap();

        let lines = read_lines(&temp_dir.path().join(REQUEST_LOG_FILE));
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("first"));
        assert!(lines[1].contains("second"));
    }

    #[test]
    fn test_close_twice_and_write_after_close() {
        let temp_dir = TempDir::new().unwrap();
        let store = JsonlRequestStore::open(temp_dir.path()).unwrap();

        store.close().unwrap();
        store.close().unwrap();

        let err = store.record_failure("nodeinfo", "s", "late").unwrap_err();
        assert!(matches!(err, StoreError::Closed));
    }

    #[test]
    fn test_concurrent_appends_are_not_interleaved() {
        let temp_dir = TempDir::new().unwrap();
        let store = Arc::new(JsonlRequestStore::open(temp_dir.path()).unwrap());

        let threads = 16;
        let per_thread = 50;

        let handles: Vec<_> = (0..threads)
            .map(|t| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for i in 0..per_thread {
                        let session = format!("t{}", t);
                        if i % 2 == 0 {
                            store
                                .record_success(
                                    "nodeinfo",
                                    &session,
                                    serde_json::json!({"seq": i, "padding": "x".repeat(512)}),
                                )
                                .unwrap();
                        } else {
                            store
                                .record_failure("nodeinfo", &session, &format!("failure {}", i))
                                .unwrap();
                        }
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        store.close().unwrap();

        let lines = read_lines(store.path());
        assert_eq!(lines.len(), threads * per_thread);

        let mut per_session = std::collections::HashMap::new();
        for line in &lines {
            let value: serde_json::Value = serde_json::from_str(line).unwrap();
            assert!(value.get("result").is_some() != value.get("error").is_some());
            *per_session
                .entry(value["session_id"].as_str().unwrap().to_string())
                .or_insert(0) += 1;
        }

        assert_eq!(per_session.len(), threads);
        assert!(per_session.values().all(|count| *count == per_thread));
    }
}
