//! Transcript persistence.

use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// One completed exchange: the user's message and the assembled answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub message: String,
    pub response: String,
    pub created_at: DateTime<Utc>,
}

impl TranscriptRecord {
    pub fn new(
        user_id: Option<String>,
        message: impl Into<String>,
        response: impl Into<String>,
    ) -> Self {
        Self {
            user_id,
            message: message.into(),
            response: response.into(),
            created_at: Utc::now(),
        }
    }
}

/// Destination for finished exchanges. The relay never calls this itself.
#[async_trait]
pub trait TranscriptStore: Send + Sync {
    async fn save(&self, record: TranscriptRecord) -> Result<()>;

    /// Records for `user_id` (all records when `None`), oldest first.
    async fn history(&self, user_id: Option<&str>) -> Result<Vec<TranscriptRecord>>;
}

fn belongs_to(record: &TranscriptRecord, user_id: Option<&str>) -> bool {
    user_id.map_or(true, |id| record.user_id.as_deref() == Some(id))
}

/// In-memory store for tests and single-process use.
#[derive(Default, Clone)]
pub struct InMemoryTranscriptStore {
    records: Arc<RwLock<Vec<TranscriptRecord>>>,
}

impl InMemoryTranscriptStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl TranscriptStore for InMemoryTranscriptStore {
    async fn save(&self, record: TranscriptRecord) -> Result<()> {
        if let Ok(mut records) = self.records.write() {
            records.push(record);
        }
        Ok(())
    }

    async fn history(&self, user_id: Option<&str>) -> Result<Vec<TranscriptRecord>> {
        Ok(self
            .records
            .read()
            .map(|records| {
                records
                    .iter()
                    .filter(|r| belongs_to(r, user_id))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

/// Append-only JSON Lines file, one record per line.
pub struct JsonlTranscriptStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlTranscriptStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }
}

#[async_trait]
impl TranscriptStore for JsonlTranscriptStore {
    async fn save(&self, record: TranscriptRecord) -> Result<()> {
        let mut line = serde_json::to_string(&record)?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    async fn history(&self, user_id: Option<&str>) -> Result<Vec<TranscriptRecord>> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut records = Vec::new();
        for line in raw.lines().filter(|l| !l.trim().is_empty()) {
            match serde_json::from_str::<TranscriptRecord>(line) {
                Ok(record) if belongs_to(&record, user_id) => records.push(record),
                Ok(_) => {}
                Err(e) => tracing::warn!(error = %e, "skipping corrupt transcript line"),
            }
        }
        Ok(records)
    }
}
