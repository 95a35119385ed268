//! Voice-order server
//!
//! Provides the WebSocket audio endpoint and HTTP endpoints around the
//! streaming transcription pipeline.

pub mod connection;
pub mod dialogue;
pub mod http;
pub mod metrics;
pub mod rate_limit;
pub mod registry;
pub mod state;
pub mod websocket;

pub use connection::{ConnectionLifecycle, ConnectionOutcome, ConnectionServices, EndReason};
pub use dialogue::{DialogueError, DialogueHandler, HttpDialogue, NoopDialogue, UtteranceHandoff};
pub use http::create_router;
pub use self::metrics::init_metrics;
pub use rate_limit::{RateLimitError, RateLimiter};
pub use registry::{ConnectionEntry, ConnectionGuard, ConnectionRegistry, ConnectionSnapshot};
pub use state::AppState;

use thiserror::Error;

/// Server errors
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Connection limit reached ({0})")]
    CapacityExceeded(usize),

    #[error("Configuration error: {0}")]
    Config(#[from] voice_order_config::ConfigError),

    #[error("Backend error: {0}")]
    Backend(#[from] voice_order_core::TranscriptionError),

    #[error("Metrics error: {0}")]
    Metrics(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<ServerError> for axum::http::StatusCode {
    fn from(err: ServerError) -> Self {
        match err {
            ServerError::CapacityExceeded(_) => axum::http::StatusCode::SERVICE_UNAVAILABLE,
            ServerError::Config(_)
            | ServerError::Backend(_)
            | ServerError::Metrics(_)
            | ServerError::Internal(_) => axum::http::StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
