//! Batched background writer
//!
//! Records are queued without blocking the connection and written by one
//! background task in batches: when a batch fills, on a flush interval,
//! and on shutdown.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use voice_order_config::PersistenceConfig;

use crate::error::PersistenceError;
use crate::record::TranscriptRecord;
use crate::store::TranscriptStore;

enum Command {
    Record(Box<TranscriptRecord>),
    Flush(oneshot::Sender<()>),
}

/// Handle to the background writer task
pub struct TranscriptWriter {
    tx: Mutex<Option<mpsc::Sender<Command>>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl TranscriptWriter {
    /// Start the writer task
    pub fn spawn(store: Arc<dyn TranscriptStore>, config: &PersistenceConfig) -> Self {
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let task = tokio::spawn(run(
            store,
            rx,
            config.batch_size.max(1),
            config.flush_interval(),
        ));

        Self {
            tx: Mutex::new(Some(tx)),
            task: Mutex::new(Some(task)),
        }
    }

    /// Queue a record without waiting; a full queue drops it
    pub fn submit(&self, record: TranscriptRecord) -> Result<(), PersistenceError> {
        let tx = self.tx.lock().clone().ok_or(PersistenceError::WriterClosed)?;
        match tx.try_send(Command::Record(Box::new(record))) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!("Transcript queue full, record dropped");
                Err(PersistenceError::QueueFull)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(PersistenceError::WriterClosed),
        }
    }

    /// Write everything queued so far
    pub async fn flush(&self) -> Result<(), PersistenceError> {
        let tx = self.tx.lock().clone().ok_or(PersistenceError::WriterClosed)?;
        let (ack_tx, ack_rx) = oneshot::channel();
        tx.send(Command::Flush(ack_tx))
            .await
            .map_err(|_| PersistenceError::WriterClosed)?;
        ack_rx.await.map_err(|_| PersistenceError::WriterClosed)
    }

    /// Stop accepting records, write what is queued and wait for the task
    pub async fn shutdown(&self) {
        drop(self.tx.lock().take());
        let task = self.task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "Transcript writer task failed");
            }
        }
    }
}

async fn run(
    store: Arc<dyn TranscriptStore>,
    mut rx: mpsc::Receiver<Command>,
    batch_size: usize,
    flush_interval: Duration,
) {
    let mut batch: Vec<TranscriptRecord> = Vec::with_capacity(batch_size);
    let mut ticker = tokio::time::interval(flush_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            command = rx.recv() => match command {
                Some(Command::Record(record)) => {
                    batch.push(*record);
                    if batch.len() >= batch_size {
                        write_batch(store.as_ref(), &mut batch).await;
                    }
                }
                Some(Command::Flush(ack)) => {
                    write_batch(store.as_ref(), &mut batch).await;
                    let _ = ack.send(());
                }
                None => {
                    write_batch(store.as_ref(), &mut batch).await;
                    break;
                }
            },
            _ = ticker.tick() => {
                write_batch(store.as_ref(), &mut batch).await;
            }
        }
    }

    tracing::debug!("Transcript writer stopped");
}

async fn write_batch(store: &dyn TranscriptStore, batch: &mut Vec<TranscriptRecord>) {
    if batch.is_empty() {
        return;
    }
    let count = batch.len();
    if let Err(e) = store.append(batch).await {
        tracing::warn!(error = %e, count, "Failed to write transcript batch, dropping");
    }
    batch.clear();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryTranscriptStore;
    use voice_order_core::{LanguagePreference, Provenance, SessionConfig, TranscriptCandidate};

    fn record(i: usize) -> TranscriptRecord {
        let session = SessionConfig::new(format!("s{}", i), "guest");
        let candidate = TranscriptCandidate::new(format!("order {}", i), vec![], None, Provenance::Partial);
        TranscriptRecord::new(&session, &candidate, LanguagePreference::Auto)
    }

    fn config(batch_size: usize, flush_interval_ms: u64) -> PersistenceConfig {
        PersistenceConfig {
            batch_size,
            flush_interval_ms,
            ..PersistenceConfig::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_batch_written() {
        let store = MemoryTranscriptStore::new();
        let writer = TranscriptWriter::spawn(Arc::new(store.clone()), &config(3, 60_000));

        for i in 0..4 {
            writer.submit(record(i)).unwrap();
        }
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(store.batch_sizes(), vec![3]);

        writer.shutdown().await;
        assert_eq!(store.batch_sizes(), vec![3, 1]);
        assert_eq!(store.records()[3].text, "order 3");
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_flushes_partial_batch() {
        let store = MemoryTranscriptStore::new();
        let writer = TranscriptWriter::spawn(Arc::new(store.clone()), &config(10, 2000));

        writer.submit(record(1)).unwrap();
        tokio::time::sleep(Duration::from_millis(2500)).await;

        assert_eq!(store.records().len(), 1);
        writer.shutdown().await;
    }

    #[tokio::test]
    async fn test_explicit_flush() {
        let store = MemoryTranscriptStore::new();
        let writer = TranscriptWriter::spawn(Arc::new(store.clone()), &config(10, 60_000));

        writer.submit(record(1)).unwrap();
        writer.flush().await.unwrap();
        assert_eq!(store.records().len(), 1);
        writer.shutdown().await;
    }

    #[tokio::test]
    async fn test_submit_after_shutdown_fails() {
        let writer = TranscriptWriter::spawn(Arc::new(MemoryTranscriptStore::new()), &config(10, 60_000));
        writer.shutdown().await;

        assert!(matches!(writer.submit(record(1)), Err(PersistenceError::WriterClosed)));
    }

    #[tokio::test]
    async fn test_full_queue_drops_record() {
        let store = MemoryTranscriptStore::new();
        let cfg = PersistenceConfig {
            queue_capacity: 1,
            ..config(10, 60_000)
        };
        let writer = TranscriptWriter::spawn(Arc::new(store), &cfg);

        // The writer task has not run yet on this single-threaded runtime
        writer.submit(record(1)).unwrap();
        assert!(matches!(writer.submit(record(2)), Err(PersistenceError::QueueFull)));
        writer.shutdown().await;
    }
}
