//! Speech-to-text backends
//!
//! Every backend implements [`SttBackend`]:
//! - Whisper server (local, fast): partials and the local full pass
//! - OpenAI Whisper (remote, accurate): finalization only, under a budget
//!
//! Backends hold only a shared, read-only HTTP client and are safe to call
//! concurrently from many connections.

mod factory;
mod http;
mod openai;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
mod whisper_server;

pub use factory::{BackendFactory, Backends};
pub use openai::OpenAiWhisperBackend;
pub use whisper_server::WhisperServerBackend;

use std::time::Duration;

use async_trait::async_trait;
use voice_order_core::{Language, PcmAudio, Transcription, TranscriptionError};

/// Transcription backend contract
#[async_trait]
pub trait SttBackend: Send + Sync {
    /// Name used in logs and metrics
    fn name(&self) -> &str;

    /// Transcribe a block of audio, optionally forcing a language
    async fn transcribe(
        &self,
        audio: &PcmAudio,
        language: Option<Language>,
    ) -> Result<Transcription, TranscriptionError>;

    /// Transcribe within `budget`; the call is cancelled on expiry
    async fn transcribe_within(
        &self,
        audio: &PcmAudio,
        language: Option<Language>,
        budget: Duration,
    ) -> Result<Transcription, TranscriptionError> {
        match tokio::time::timeout(budget, self.transcribe(audio, language)).await {
            Ok(result) => result,
            Err(_) => Err(TranscriptionError::Timeout(budget)),
        }
    }
}
