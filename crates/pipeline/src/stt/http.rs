//! OpenAI-compatible `/audio/transcriptions` client shared by the HTTP backends

use reqwest::multipart;
use serde::Deserialize;
use voice_order_core::{Language, PcmAudio, Transcription, TranscriptionError};

/// `verbose_json` response body
#[derive(Debug, Deserialize)]
pub(crate) struct VerboseTranscription {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub segments: Vec<VerboseSegment>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct VerboseSegment {
    pub start: f64,
    pub end: f64,
}

impl VerboseTranscription {
    /// Convert into a transcription; a forced language stands in when none is reported
    pub fn into_transcription(self, forced: Option<Language>) -> Transcription {
        let detected = self
            .language
            .as_deref()
            .and_then(Language::parse)
            .or(forced);

        let mut transcription = Transcription::new(self.text)
            .with_segments(self.segments.into_iter().map(|s| (s.start, s.end)).collect());
        transcription.detected_language = detected;
        transcription
    }
}

/// One request against an OpenAI-compatible transcription endpoint
pub(crate) struct TranscriptionRequest<'a> {
    pub client: &'a reqwest::Client,
    pub base_url: &'a str,
    pub api_key: Option<&'a str>,
    pub model: &'a str,
}

impl TranscriptionRequest<'_> {
    pub async fn send(
        &self,
        audio: &PcmAudio,
        language: Option<Language>,
    ) -> Result<Transcription, TranscriptionError> {
        let url = format!("{}/audio/transcriptions", self.base_url.trim_end_matches('/'));
        let wav = audio.to_wav()?;

        let file_part = multipart::Part::bytes(wav)
            .file_name("audio.wav")
            .mime_str("audio/wav")
            .map_err(|e| TranscriptionError::Request(format!("mime: {}", e)))?;

        let mut form = multipart::Form::new()
            .text("model", self.model.to_string())
            .text("response_format", "verbose_json")
            .text("temperature", "0")
            .part("file", file_part);
        if let Some(lang) = language {
            form = form.text("language", lang.code());
        }

        let mut request = self.client.post(&url).multipart(form);
        if let Some(key) = self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_connect() {
                TranscriptionError::Unavailable(format!("connect: {}", e))
            } else if e.is_timeout() {
                TranscriptionError::Request(format!("http timeout: {}", e))
            } else {
                TranscriptionError::Request(format!("request: {}", e))
            }
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(TranscriptionError::Request(format!(
                "status {}: {}",
                status, body
            )));
        }

        let body: VerboseTranscription = response
            .json()
            .await
            .map_err(|e| TranscriptionError::InvalidResponse(format!("body: {}", e)))?;

        Ok(body.into_transcription(language))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_verbose_json() {
        let json = r#"{
            "task": "transcribe",
            "language": "bengali",
            "duration": 2.1,
            "text": " আমি চা চাই ",
            "segments": [
                {"id": 0, "start": 0.0, "end": 1.0, "text": "আমি"},
                {"id": 1, "start": 1.0, "end": 2.1, "text": "চা চাই"}
            ]
        }"#;
        let body: VerboseTranscription = serde_json::from_str(json).unwrap();
        let t = body.into_transcription(None);

        assert_eq!(t.text, "আমি চা চাই");
        assert_eq!(t.segments, vec![(0.0, 1.0), (1.0, 2.1)]);
        assert_eq!(t.detected_language, Some(Language::Bengali));
    }

    #[test]
    fn test_forced_language_fills_missing() {
        let body: VerboseTranscription = serde_json::from_str(r#"{"text": "two teas"}"#).unwrap();
        let t = body.into_transcription(Some(Language::English));

        assert!(t.segments.is_empty());
        assert_eq!(t.detected_language, Some(Language::English));
    }
}
