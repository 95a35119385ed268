//! Main settings module

use std::time::Duration;

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::{ConfigError, PipelineConfig, SanityConfig};

/// Main application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Pipeline configuration
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Transcription backends
    #[serde(default)]
    pub backends: BackendsConfig,

    /// Candidate sanity filter
    #[serde(default)]
    pub sanity: SanityConfig,

    /// Transcript persistence
    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// Downstream dialogue collaborator
    #[serde(default)]
    pub dialogue: DialogueConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Settings {
    /// Create default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.pipeline.validate()?;

        if self.server.max_connections == 0 {
            return Err(ConfigError::InvalidValue {
                field: "server.max_connections".to_string(),
                message: "At least one connection must be allowed".to_string(),
            });
        }

        if self.persistence.enabled && self.persistence.batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "persistence.batch_size".to_string(),
                message: "Batch size must be positive".to_string(),
            });
        }

        for (field, backend) in [
            ("backends.local", &self.backends.local),
            ("backends.remote", &self.backends.remote),
        ] {
            if backend.provider != BackendProvider::Disabled && backend.base_url.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: format!("{}.base_url", field),
                    message: "Base URL required for an enabled backend".to_string(),
                });
            }
        }

        if self.backends.remote.provider == BackendProvider::OpenAi
            && self.backends.remote.api_key.is_none()
        {
            tracing::warn!("Remote backend enabled without an API key");
        }

        Ok(())
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP server host
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// WebSocket path
    #[serde(default = "default_ws_path")]
    pub ws_path: String,

    /// Maximum concurrent audio connections
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,

    /// Time allowed between upgrade and the `hello` message
    #[serde(default = "default_handshake_timeout")]
    pub handshake_timeout_ms: u64,

    /// Enable CORS
    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// CORS allowed origins (empty = any)
    #[serde(default)]
    pub cors_origins: Vec<String>,

    /// Per-connection rate limiting
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// How long shutdown waits for live connections to finalize
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace_ms: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    7071
}
fn default_ws_path() -> String {
    "/ws".to_string()
}
fn default_max_connections() -> usize {
    256
}
fn default_handshake_timeout() -> u64 {
    10_000
}
fn default_shutdown_grace() -> u64 {
    10_000
}
fn default_true() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            ws_path: default_ws_path(),
            max_connections: default_max_connections(),
            handshake_timeout_ms: default_handshake_timeout(),
            cors_enabled: true,
            cors_origins: Vec::new(),
            rate_limit: RateLimitConfig::default(),
            shutdown_grace_ms: default_shutdown_grace(),
        }
    }
}

impl ServerConfig {
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

/// Rate limiting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Enable rate limiting
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Max audio frames per second per connection; control messages are not counted
    #[serde(default = "default_messages_per_second")]
    pub messages_per_second: u32,

    /// Floor for the audio byte budget per connection
    #[serde(default = "default_audio_bytes_per_second")]
    pub audio_bytes_per_second: u32,

    /// Audio budget as a multiple of the session's real-time byte rate
    #[serde(default = "default_realtime_headroom")]
    pub realtime_headroom: f32,

    /// Burst allowance multiplier
    #[serde(default = "default_burst_multiplier")]
    pub burst_multiplier: f32,
}

fn default_messages_per_second() -> u32 {
    400 // 128-sample frames at 48kHz
}
fn default_audio_bytes_per_second() -> u32 {
    64_000 // 2x real-time at 16kHz mono
}
fn default_realtime_headroom() -> f32 {
    2.0
}
fn default_burst_multiplier() -> f32 {
    2.0
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            messages_per_second: default_messages_per_second(),
            audio_bytes_per_second: default_audio_bytes_per_second(),
            realtime_headroom: default_realtime_headroom(),
            burst_multiplier: default_burst_multiplier(),
        }
    }
}

/// Which transcription service a backend slot talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendProvider {
    /// OpenAI-compatible whisper server running next to us
    WhisperServer,
    /// Hosted OpenAI transcription API
    #[serde(rename = "openai")]
    OpenAi,
    /// Slot not configured
    Disabled,
}

/// One transcription backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    pub provider: BackendProvider,

    /// Base URL up to and including the API version, e.g. `http://host/v1`
    #[serde(default)]
    pub base_url: String,

    /// Bearer token
    #[serde(default)]
    pub api_key: Option<String>,

    /// Model name sent with each request
    #[serde(default = "default_model")]
    pub model: String,

    /// HTTP request timeout
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,
}

fn default_model() -> String {
    "whisper-1".to_string()
}
fn default_request_timeout() -> u64 {
    10_000
}

impl BackendConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != BackendProvider::Disabled
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    fn default_local() -> Self {
        Self {
            provider: BackendProvider::WhisperServer,
            base_url: "http://127.0.0.1:8000/v1".to_string(),
            api_key: None,
            model: "small".to_string(),
            request_timeout_ms: default_request_timeout(),
        }
    }

    fn default_remote() -> Self {
        Self {
            provider: BackendProvider::Disabled,
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            model: default_model(),
            request_timeout_ms: default_request_timeout(),
        }
    }
}

/// Local (fast) and remote (accurate) backend slots
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendsConfig {
    #[serde(default = "BackendConfig::default_local")]
    pub local: BackendConfig,

    #[serde(default = "BackendConfig::default_remote")]
    pub remote: BackendConfig,
}

impl Default for BackendsConfig {
    fn default() -> Self {
        Self {
            local: BackendConfig::default_local(),
            remote: BackendConfig::default_remote(),
        }
    }
}

/// Transcript persistence configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// JSON-lines output file
    #[serde(default = "default_transcript_path")]
    pub path: String,

    /// Records per write
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Flush a partial batch after this long
    #[serde(default = "default_flush_interval")]
    pub flush_interval_ms: u64,

    /// Records queued before new ones are dropped
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_transcript_path() -> String {
    "data/transcripts.jsonl".to_string()
}
fn default_batch_size() -> usize {
    10
}
fn default_flush_interval() -> u64 {
    2000
}
fn default_queue_capacity() -> usize {
    1024
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: default_transcript_path(),
            batch_size: default_batch_size(),
            flush_interval_ms: default_flush_interval(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

impl PersistenceConfig {
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }
}

/// Dialogue collaborator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DialogueConfig {
    /// HTTP endpoint receiving finalized utterances; none = log only
    #[serde(default)]
    pub endpoint: Option<String>,

    #[serde(default = "default_dialogue_timeout")]
    pub timeout_ms: u64,
}

fn default_dialogue_timeout() -> u64 {
    4000
}

impl Default for DialogueConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_ms: default_dialogue_timeout(),
        }
    }
}

impl DialogueConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub log_json: bool,

    /// Enable Prometheus metrics
    #[serde(default = "default_true")]
    pub metrics_enabled: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_json: false,
            metrics_enabled: true,
        }
    }
}

/// Load settings from files and environment
pub fn load_settings(env: Option<&str>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder();

    // Load default config
    builder = builder.add_source(File::with_name("config/default").required(false));

    // Load environment-specific config
    if let Some(env_name) = env {
        builder = builder.add_source(File::with_name(&format!("config/{}", env_name)).required(false));
    }

    // Load from environment variables
    builder = builder.add_source(
        Environment::with_prefix("VOICE_ORDER")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;
    let settings: Settings = config.try_deserialize()?;

    settings.validate()?;

    Ok(settings)
}
