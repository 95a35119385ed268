//! Error types shared across the workspace

use std::time::Duration;

use thiserror::Error;

/// Result type alias using our Error
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error for the voice-order front end
#[derive(Error, Debug)]
pub enum Error {
    #[error("Transcription error: {0}")]
    Transcription(#[from] TranscriptionError),

    #[error("Invalid session: {0}")]
    InvalidSession(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors returned by a transcription backend
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TranscriptionError {
    /// Backend unreachable or misconfigured
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    /// Call exceeded its budget and was cancelled
    #[error("Timeout after {}ms", .0.as_millis())]
    Timeout(Duration),

    /// Backend answered with an error
    #[error("Request failed: {0}")]
    Request(String),

    /// Backend answered with something we could not read
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Audio could not be prepared for the backend
    #[error("Invalid audio: {0}")]
    InvalidAudio(String),
}

impl TranscriptionError {
    /// Short label for metrics
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unavailable(_) => "unavailable",
            Self::Timeout(_) => "timeout",
            Self::Request(_) => "request",
            Self::InvalidResponse(_) => "invalid_response",
            Self::InvalidAudio(_) => "invalid_audio",
        }
    }
}
