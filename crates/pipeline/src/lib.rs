//! Real-time audio segmentation and finalization pipeline
//!
//! This crate turns an unbounded stream of PCM bytes into low-latency
//! partial transcripts and one final transcript per utterance:
//! - Windowing buffer (`Segmenter`)
//! - Freshest-wins handoff (`LatestSlot`)
//! - Streaming worker with size/energy gating
//! - Transcription backends (local whisper server, remote OpenAI Whisper)
//! - Finalization arbiter with ordered fallback tiers

pub mod arbiter;
pub mod gate;
pub mod segmenter;
pub mod slot;
pub mod stt;
pub mod worker;

// Arbiter exports
pub use arbiter::{
    FinalizationArbiter, FinalizationInput, FinalizationResult, TierAttempt, TierRejection,
    TIER_ORDER,
};

// Windowing exports
pub use gate::{SkipReason, WindowGate};
pub use segmenter::Segmenter;
pub use slot::{LatestSlot, SlotSend};

// STT exports
pub use stt::{BackendFactory, Backends, OpenAiWhisperBackend, SttBackend, WhisperServerBackend};

// Worker exports
pub use worker::{StreamingWorker, WorkerEvent, WorkerHandle, WorkerStats};
