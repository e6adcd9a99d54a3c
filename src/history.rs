//! Document history: an external collaborator the core only appends to.
//!
//! The core never persists an [`crate::contract::AnalysisResult`] itself;
//! a completed analysis *may* be recorded through a [`HistoryStore`]. The
//! record deliberately carries only the listing fields (id, timestamp,
//! type, summary, status), not the full result, so the store never holds
//! raw document content.
//!
//! Two implementations ship: [`MemoryHistory`] for tests and in-process
//! listings, [`JsonlHistory`] for the CLI's append-only file log.

use crate::contract::AnalysisResult;
use crate::error::AnalysisError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Terminal status of a recorded analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordStatus {
    Completed,
    Failed,
}

/// One history listing entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRecord {
    /// Opaque job id, e.g. `job_6f9619ff8b86d011b42d00c04fc964ff`.
    pub id: String,
    /// When the analysis finished.
    pub timestamp: DateTime<Utc>,
    /// The classified document type, or "Unknown" for failures.
    pub document_type: String,
    /// The result summary, or the failure message.
    pub summary: String,
    /// Whether the analysis completed.
    pub status: RecordStatus,
}

impl HistoryRecord {
    /// Record a completed analysis.
    pub fn completed(result: &AnalysisResult) -> Self {
        Self {
            id: new_job_id(),
            timestamp: Utc::now(),
            document_type: result.document_type.clone(),
            summary: result.summary.clone(),
            status: RecordStatus::Completed,
        }
    }

    /// Record a failed analysis.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            id: new_job_id(),
            timestamp: Utc::now(),
            document_type: "Unknown".into(),
            summary: message.into(),
            status: RecordStatus::Failed,
        }
    }
}

fn new_job_id() -> String {
    format!("job_{}", Uuid::new_v4().simple())
}

/// Where completed analyses go. The core defines the interface only; the
/// backing store (database, file, nothing at all) belongs to the host
/// application.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Append one record.
    async fn append(&self, record: HistoryRecord) -> Result<(), AnalysisError>;

    /// List records, newest first.
    async fn list(&self) -> Result<Vec<HistoryRecord>, AnalysisError>;
}

/// In-memory history, newest first. Suitable for tests and single-process
/// listings; contents vanish with the process.
#[derive(Default)]
pub struct MemoryHistory {
    records: Mutex<Vec<HistoryRecord>>,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HistoryStore for MemoryHistory {
    async fn append(&self, record: HistoryRecord) -> Result<(), AnalysisError> {
        self.records.lock().await.push(record);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<HistoryRecord>, AnalysisError> {
        let records = self.records.lock().await;
        let mut out: Vec<HistoryRecord> = records.clone();
        out.reverse();
        Ok(out)
    }
}

/// Append-only JSON-lines history file, one record per line.
pub struct JsonlHistory {
    path: PathBuf,
}

impl JsonlHistory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl HistoryStore for JsonlHistory {
    async fn append(&self, record: HistoryRecord) -> Result<(), AnalysisError> {
        let mut line = serde_json::to_string(&record)
            .map_err(|e| AnalysisError::Internal(format!("history serialize: {e}")))?;
        line.push('\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| {
                AnalysisError::Internal(format!("history open '{}': {e}", self.path.display()))
            })?;
        file.write_all(line.as_bytes()).await.map_err(|e| {
            AnalysisError::Internal(format!("history write '{}': {e}", self.path.display()))
        })?;
        Ok(())
    }

    async fn list(&self) -> Result<Vec<HistoryRecord>, AnalysisError> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(AnalysisError::Internal(format!(
                    "history read '{}': {e}",
                    self.path.display()
                )))
            }
        };

        let mut records = Vec::new();
        for line in contents.lines().filter(|l| !l.trim().is_empty()) {
            let record: HistoryRecord = serde_json::from_str(line)
                .map_err(|e| AnalysisError::Internal(format!("history parse: {e}")))?;
            records.push(record);
        }
        records.reverse();
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::{AnalysisResult, KeyFact};

    fn sample_result() -> AnalysisResult {
        AnalysisResult {
            document_type: "Lease Agreement".into(),
            summary: "Apartment lease for 123 Main St.".into(),
            key_facts: vec![KeyFact {
                fact: "Rent is $1,850".into(),
                citation: "Section 3".into(),
            }],
            risks_and_fees: vec![],
            to_do_items: vec![],
        }
    }

    #[test]
    fn job_ids_are_unique_and_prefixed() {
        let a = HistoryRecord::completed(&sample_result());
        let b = HistoryRecord::completed(&sample_result());
        assert!(a.id.starts_with("job_"));
        assert_ne!(a.id, b.id);
    }

    #[tokio::test]
    async fn memory_history_lists_newest_first() {
        let store = MemoryHistory::new();
        store
            .append(HistoryRecord::completed(&sample_result()))
            .await
            .unwrap();
        store
            .append(HistoryRecord::failed("Model call timed out after 60s"))
            .await
            .unwrap();

        let records = store.list().await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].status, RecordStatus::Failed);
        assert_eq!(records[1].document_type, "Lease Agreement");
    }

    #[tokio::test]
    async fn jsonl_history_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlHistory::new(dir.path().join("history.jsonl"));

        store
            .append(HistoryRecord::completed(&sample_result()))
            .await
            .unwrap();
        store
            .append(HistoryRecord::failed("Unsupported document type 'text/html'"))
            .await
            .unwrap();

        let records = store.list().await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].status, RecordStatus::Failed);
        assert_eq!(records[1].summary, "Apartment lease for 123 Main St.");
    }

    #[tokio::test]
    async fn jsonl_history_missing_file_lists_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlHistory::new(dir.path().join("absent.jsonl"));
        assert!(store.list().await.unwrap().is_empty());
    }
}
