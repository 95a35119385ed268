//! Local whisper server backend
//!
//! Talks to an OpenAI-compatible whisper server running next to the
//! service (faster-whisper, whisper.cpp server). Used for partials and the
//! local full pass.

use std::time::Instant;

use async_trait::async_trait;
use voice_order_core::{Language, PcmAudio, Transcription, TranscriptionError};

use super::http::TranscriptionRequest;
use super::SttBackend;

pub struct WhisperServerBackend {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl WhisperServerBackend {
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            api_key,
            model: model.into(),
        }
    }
}

#[async_trait]
impl SttBackend for WhisperServerBackend {
    fn name(&self) -> &str {
        "whisper_server"
    }

    async fn transcribe(
        &self,
        audio: &PcmAudio,
        language: Option<Language>,
    ) -> Result<Transcription, TranscriptionError> {
        if audio.is_empty() {
            return Ok(Transcription::default());
        }

        let start = Instant::now();
        let request = TranscriptionRequest {
            client: &self.client,
            base_url: &self.base_url,
            api_key: self.api_key.as_deref(),
            model: &self.model,
        };
        let transcription = request.send(audio, language).await?;

        tracing::debug!(
            bytes = audio.len_bytes(),
            chars = transcription.text.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Whisper server transcription completed"
        );

        Ok(transcription)
    }
}
