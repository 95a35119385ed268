//! Streaming worker
//!
//! Consumes windows from a [`LatestSlot`] one at a time, transcribes them
//! with the local backend and publishes partials. Runs as its own task so
//! backend latency never blocks frame receipt.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use voice_order_core::{Language, PcmAudio};

use crate::gate::WindowGate;
use crate::slot::{LatestSlot, SlotSend};
use crate::stt::SttBackend;

/// Event published by the worker
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerEvent {
    /// A window produced non-empty text
    Partial {
        text: String,
        language: Option<Language>,
        window_bytes: usize,
        elapsed: Duration,
    },
}

/// Counters reported when the worker stops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    /// Windows taken from the slot
    pub windows: u64,
    /// Windows dropped by the gate
    pub skipped: u64,
    /// Backend errors
    pub failed: u64,
    /// Windows that produced no text
    pub empty: u64,
    /// Partials published
    pub partials: u64,
}

/// Worker for one connection
pub struct StreamingWorker {
    session_id: String,
    backend: Arc<dyn SttBackend>,
    gate: WindowGate,
    language: Option<Language>,
    sample_rate: u32,
}

impl StreamingWorker {
    pub fn new(
        session_id: impl Into<String>,
        backend: Arc<dyn SttBackend>,
        gate: WindowGate,
        language: Option<Language>,
        sample_rate: u32,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            backend,
            gate,
            language,
            sample_rate,
        }
    }

    /// Process windows until the slot is closed and empty, or the event
    /// receiver goes away
    pub async fn run(
        self,
        windows: LatestSlot<Vec<u8>>,
        events: mpsc::Sender<WorkerEvent>,
    ) -> WorkerStats {
        let mut stats = WorkerStats::default();

        while let Some(window) = windows.recv().await {
            stats.windows += 1;
            let audio = PcmAudio::new(window, self.sample_rate);

            if let Err(reason) = self.gate.check(&audio) {
                stats.skipped += 1;
                tracing::trace!(session_id = %self.session_id, %reason, "Window skipped");
                continue;
            }

            let start = Instant::now();
            match self.backend.transcribe(&audio, self.language).await {
                Ok(transcription) if transcription.is_empty() => {
                    stats.empty += 1;
                    tracing::debug!(session_id = %self.session_id, bytes = audio.len_bytes(), "Empty partial");
                }
                Ok(transcription) => {
                    let event = WorkerEvent::Partial {
                        text: transcription.text,
                        language: transcription.detected_language,
                        window_bytes: audio.len_bytes(),
                        elapsed: start.elapsed(),
                    };
                    if events.send(event).await.is_err() {
                        tracing::debug!(session_id = %self.session_id, "Event receiver dropped, stopping worker");
                        break;
                    }
                    stats.partials += 1;
                }
                Err(e) => {
                    stats.failed += 1;
                    tracing::warn!(
                        session_id = %self.session_id,
                        backend = self.backend.name(),
                        error = %e,
                        "Partial transcription failed"
                    );
                }
            }
        }

        tracing::debug!(session_id = %self.session_id, ?stats, "Streaming worker stopped");
        stats
    }
}

/// Owning handle to a running worker task
///
/// Dropping the handle closes the slot and aborts the task, so a worker
/// never outlives its connection.
pub struct WorkerHandle {
    slot: LatestSlot<Vec<u8>>,
    task: Option<JoinHandle<WorkerStats>>,
}

impl WorkerHandle {
    /// Spawn `worker` on the runtime; events arrive on the returned receiver
    pub fn spawn(worker: StreamingWorker, event_capacity: usize) -> (Self, mpsc::Receiver<WorkerEvent>) {
        let slot = LatestSlot::new();
        let (tx, rx) = mpsc::channel(event_capacity.max(1));
        let task = tokio::spawn(worker.run(slot.clone(), tx));
        (
            Self {
                slot,
                task: Some(task),
            },
            rx,
        )
    }

    /// Hand a window to the worker, replacing any unconsumed one
    pub fn submit(&self, window: Vec<u8>) -> SlotSend<Vec<u8>> {
        self.slot.send(window)
    }

    /// Stop accepting windows; a pending window is still processed
    pub fn close(&self) {
        self.slot.close();
    }

    /// Wait up to `grace` for the task to stop and collect its stats;
    /// abort it otherwise, cancelling any in-flight backend call
    pub async fn finish(mut self, grace: Duration) -> Option<WorkerStats> {
        self.slot.close();
        let mut task = self.task.take()?;
        match tokio::time::timeout(grace, &mut task).await {
            Ok(joined) => joined.ok(),
            Err(_) => {
                task.abort();
                None
            }
        }
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        self.slot.close();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stt::testing::ScriptedBackend;
    use voice_order_core::TranscriptionError;

    fn speech(bytes: usize) -> Vec<u8> {
        (0..bytes / 2)
            .flat_map(|i| (if i % 2 == 0 { 9000i16 } else { -9000i16 }).to_le_bytes())
            .collect()
    }

    fn worker(backend: Arc<ScriptedBackend>) -> StreamingWorker {
        StreamingWorker::new("s1", backend, WindowGate::new(8000, 0.01), None, 16_000)
    }

    #[tokio::test]
    async fn test_publishes_partials_in_order() {
        let backend = Arc::new(
            ScriptedBackend::new("local")
                .then_text_in("two", Language::English)
                .then_text("two burgers"),
        );
        let (handle, mut events) = WorkerHandle::spawn(worker(backend.clone()), 8);

        handle.submit(speech(8000));
        let first = events.recv().await.unwrap();
        handle.submit(speech(8000));
        let second = events.recv().await.unwrap();

        assert!(matches!(first, WorkerEvent::Partial { ref text, language: Some(Language::English), .. } if text == "two"));
        assert!(matches!(second, WorkerEvent::Partial { ref text, .. } if text == "two burgers"));
        assert_eq!(backend.call_count(), 2);
    }

    #[tokio::test]
    async fn test_only_freshest_window_processed() {
        let backend = Arc::new(ScriptedBackend::new("local").then_text("latest"));
        let slot = LatestSlot::new();
        let (tx, mut rx) = mpsc::channel(4);

        // Both windows arrive before the worker starts consuming
        slot.send(speech(8000));
        slot.send(speech(12_000));
        slot.close();

        let stats = worker(backend.clone()).run(slot, tx).await;

        assert_eq!(stats.windows, 1);
        assert_eq!(backend.calls()[0].bytes, 12_000);
        assert!(matches!(rx.recv().await, Some(WorkerEvent::Partial { window_bytes: 12_000, .. })));
    }

    #[tokio::test]
    async fn test_gate_and_failures_are_absorbed() {
        let backend = Arc::new(
            ScriptedBackend::new("local")
                .then(Err(TranscriptionError::Unavailable("down".to_string())))
                .then_text("")
                .then_text("one tea"),
        );
        let slot = LatestSlot::new();
        let (tx, mut rx) = mpsc::channel(4);
        let task = tokio::spawn(worker(backend.clone()).run(slot.clone(), tx));

        for window in [vec![0u8; 100], vec![0u8; 8000], speech(8000), speech(8000), speech(8000)] {
            slot.send(window);
            tokio::task::yield_now().await;
            while slot.is_pending() {
                tokio::task::yield_now().await;
            }
        }
        slot.close();
        let stats = task.await.unwrap();

        assert_eq!(stats.skipped, 2);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.empty, 1);
        assert_eq!(stats.partials, 1);
        assert!(matches!(rx.recv().await, Some(WorkerEvent::Partial { ref text, .. }) if text == "one tea"));
    }

    #[tokio::test]
    async fn test_finish_collects_stats() {
        let backend = Arc::new(ScriptedBackend::new("local").then_text("one tea"));
        let (handle, mut events) = WorkerHandle::spawn(worker(backend), 4);
        handle.submit(speech(8000));
        assert!(events.recv().await.is_some());

        let stats = handle.finish(Duration::from_secs(1)).await.unwrap();
        assert_eq!(stats.partials, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_finish_aborts_slow_worker() {
        let backend = Arc::new(
            ScriptedBackend::new("local").otherwise(Duration::from_secs(60), Ok(Default::default())),
        );
        let (handle, _events) = WorkerHandle::spawn(worker(backend), 1);
        handle.submit(speech(8000));
        tokio::task::yield_now().await;

        assert!(handle.finish(Duration::from_millis(300)).await.is_none());
    }

    #[tokio::test]
    async fn test_drop_aborts_worker() {
        let backend = Arc::new(
            ScriptedBackend::new("local").otherwise(Duration::from_secs(60), Ok(Default::default())),
        );
        let (handle, mut events) = WorkerHandle::spawn(worker(backend), 1);
        handle.submit(speech(8000));
        drop(handle);

        // Sender side goes away with the aborted task
        assert!(events.recv().await.is_none());
    }
}
