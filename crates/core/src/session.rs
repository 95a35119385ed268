//! Session configuration and connection states

use std::fmt;
use std::time::Duration;

use crate::audio::{BYTES_PER_SAMPLE, DEFAULT_SAMPLE_RATE};
use crate::language::LanguagePreference;

/// Per-session parameters, fixed at handshake
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// Session ID
    pub session_id: String,
    /// User ID (`guest` when the client sends none)
    pub user_id: String,
    /// Capture sample rate in Hz
    pub sample_rate: u32,
    /// Channel count (only mono is accepted)
    pub channels: u16,
    /// Language hint from the client
    pub language: LanguagePreference,
    /// Silence that ends the utterance
    pub idle_finalize: Duration,
    /// Tenant hint
    pub tenant: Option<String>,
    /// Branch hint
    pub branch: Option<String>,
    /// Sales channel hint (e.g. "dine_in", "kiosk")
    pub channel: Option<String>,
}

impl SessionConfig {
    /// Create a session config with defaults for everything but the ids
    pub fn new(session_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            user_id: user_id.into(),
            ..Self::default()
        }
    }

    /// Raw PCM bytes produced per second of audio
    pub fn bytes_per_second(&self) -> usize {
        self.sample_rate as usize * BYTES_PER_SAMPLE * self.channels.max(1) as usize
    }

    /// Bytes covering `ms` milliseconds of audio, rounded down to whole samples
    pub fn bytes_for_ms(&self, ms: u64) -> usize {
        let raw = (self.bytes_per_second() as u64 * ms / 1000) as usize;
        raw - raw % BYTES_PER_SAMPLE
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            user_id: "guest".to_string(),
            sample_rate: DEFAULT_SAMPLE_RATE,
            channels: 1,
            language: LanguagePreference::Auto,
            idle_finalize: Duration::from_millis(1200),
            tenant: None,
            branch: None,
            channel: None,
        }
    }
}

/// Lifecycle of one audio connection
///
/// Transitions only move forward; `Done` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ConnectionState {
    /// Waiting for the `hello` control message
    Handshaking,
    /// Receiving audio and emitting partials
    Streaming,
    /// Input closed; flushing the buffer and draining the worker
    Closing,
    /// Choosing the final transcript
    Finalizing,
    /// Terminal
    Done,
}

impl ConnectionState {
    /// Whether `next` is a legal successor of `self`
    pub fn can_transition_to(&self, next: ConnectionState) -> bool {
        next > *self
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Handshaking => "handshaking",
            Self::Streaming => "streaming",
            Self::Closing => "closing",
            Self::Finalizing => "finalizing",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
