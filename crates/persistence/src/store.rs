//! Transcript stores

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::io::AsyncWriteExt;

use crate::error::PersistenceError;
use crate::record::TranscriptRecord;

/// Append-only sink for transcript records
#[async_trait]
pub trait TranscriptStore: Send + Sync {
    /// Append a batch, in order
    async fn append(&self, records: &[TranscriptRecord]) -> Result<(), PersistenceError>;
}

/// JSON-lines file store
pub struct JsonlTranscriptStore {
    path: PathBuf,
}

impl JsonlTranscriptStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl TranscriptStore for JsonlTranscriptStore {
    async fn append(&self, records: &[TranscriptRecord]) -> Result<(), PersistenceError> {
        if records.is_empty() {
            return Ok(());
        }

        let mut buf = Vec::new();
        for record in records {
            serde_json::to_writer(&mut buf, record)?;
            buf.push(b'\n');
        }

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(&buf).await?;
        file.flush().await?;

        tracing::debug!(count = records.len(), path = %self.path.display(), "Transcript records written");
        Ok(())
    }
}

/// In-memory store
#[derive(Debug, Clone, Default)]
pub struct MemoryTranscriptStore {
    records: Arc<Mutex<Vec<TranscriptRecord>>>,
    batches: Arc<Mutex<Vec<usize>>>,
}

impl MemoryTranscriptStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All records appended so far
    pub fn records(&self) -> Vec<TranscriptRecord> {
        self.records.lock().clone()
    }

    /// Sizes of the batches appended so far
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batches.lock().clone()
    }
}

#[async_trait]
impl TranscriptStore for MemoryTranscriptStore {
    async fn append(&self, records: &[TranscriptRecord]) -> Result<(), PersistenceError> {
        self.records.lock().extend_from_slice(records);
        self.batches.lock().push(records.len());
        Ok(())
    }
}
