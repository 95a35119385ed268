//! Hosted OpenAI Whisper backend

use std::time::Instant;

use async_trait::async_trait;
use voice_order_core::{Language, PcmAudio, Transcription, TranscriptionError};

use super::http::TranscriptionRequest;
use super::SttBackend;

/// Remote high-accuracy backend, called only at finalization
pub struct OpenAiWhisperBackend {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAiWhisperBackend {
    pub fn new(
        client: reqwest::Client,
        api_key: String,
        base_url: Option<String>,
        model: Option<String>,
    ) -> Self {
        Self {
            client,
            api_key,
            base_url: base_url.unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            model: model.unwrap_or_else(|| "whisper-1".to_string()),
        }
    }
}

#[async_trait]
impl SttBackend for OpenAiWhisperBackend {
    fn name(&self) -> &str {
        "openai"
    }

    async fn transcribe(
        &self,
        audio: &PcmAudio,
        language: Option<Language>,
    ) -> Result<Transcription, TranscriptionError> {
        if audio.is_empty() {
            return Ok(Transcription::default());
        }

        tracing::debug!(model = %self.model, language = ?language, "Sending audio to OpenAI Whisper API");

        let start = Instant::now();
        let request = TranscriptionRequest {
            client: &self.client,
            base_url: &self.base_url,
            api_key: Some(&self.api_key),
            model: &self.model,
        };
        let transcription = request.send(audio, language).await?;

        tracing::info!(
            chars = transcription.text.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "OpenAI Whisper transcription completed"
        );

        Ok(transcription)
    }
}
