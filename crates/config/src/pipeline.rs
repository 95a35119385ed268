//! Pipeline configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};
use voice_order_core::{LanguagePreference, SessionConfig};

use crate::ConfigError;

/// Lowest idle deadline honoured; smaller values are clamped
pub const MIN_IDLE_FINALIZE_MS: u64 = 100;

/// Segmentation, gating and finalization knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Sample rate assumed when the client does not announce one
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    /// Silence (no client message) that ends the utterance
    #[serde(default = "default_idle_finalize")]
    pub idle_finalize_ms: u64,

    /// Shortest window released for a partial
    #[serde(default = "default_window_min")]
    pub window_min_ms: u64,

    /// Longest window released for a partial
    #[serde(default = "default_window_max")]
    pub window_max_ms: u64,

    /// Windows shorter than this are never sent to a backend
    #[serde(default = "default_min_window_bytes")]
    pub min_window_bytes: usize,

    /// RMS below which a window counts as silence (normalized samples)
    #[serde(default = "default_energy_gate")]
    pub energy_gate_rms: f32,

    /// Budget for the remote tier at finalization
    #[serde(default = "default_remote_timeout")]
    pub remote_timeout_ms: u64,

    /// Minimum utterance length for the remote and local full-pass tiers
    #[serde(default = "default_min_final_audio")]
    pub min_final_audio_ms: u64,

    /// How long an in-flight partial may finish after input closes
    #[serde(default = "default_drain_grace")]
    pub drain_grace_ms: u64,

    /// Utterance length that forces finalization
    #[serde(default = "default_max_utterance")]
    pub max_utterance_ms: u64,

    /// Language used when the client sends no hint
    #[serde(default = "default_language")]
    pub default_language: String,
}

fn default_sample_rate() -> u32 {
    16_000
}
fn default_idle_finalize() -> u64 {
    1200
}
fn default_window_min() -> u64 {
    500
}
fn default_window_max() -> u64 {
    2000
}
fn default_min_window_bytes() -> usize {
    8000 // 0.25s at 16kHz
}
fn default_energy_gate() -> f32 {
    0.01
}
fn default_remote_timeout() -> u64 {
    3000
}
fn default_min_final_audio() -> u64 {
    500
}
fn default_drain_grace() -> u64 {
    300
}
fn default_max_utterance() -> u64 {
    30_000
}
fn default_language() -> String {
    "auto".to_string()
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            idle_finalize_ms: default_idle_finalize(),
            window_min_ms: default_window_min(),
            window_max_ms: default_window_max(),
            min_window_bytes: default_min_window_bytes(),
            energy_gate_rms: default_energy_gate(),
            remote_timeout_ms: default_remote_timeout(),
            min_final_audio_ms: default_min_final_audio(),
            drain_grace_ms: default_drain_grace(),
            max_utterance_ms: default_max_utterance(),
            default_language: default_language(),
        }
    }
}

impl PipelineConfig {
    /// Idle deadline, clamped to the supported floor
    pub fn idle_finalize(&self) -> Duration {
        Duration::from_millis(self.idle_finalize_ms.max(MIN_IDLE_FINALIZE_MS))
    }

    pub fn remote_timeout(&self) -> Duration {
        Duration::from_millis(self.remote_timeout_ms)
    }

    pub fn drain_grace(&self) -> Duration {
        Duration::from_millis(self.drain_grace_ms)
    }

    /// Parsed default language preference
    pub fn default_language(&self) -> LanguagePreference {
        LanguagePreference::parse(Some(&self.default_language)).unwrap_or_default()
    }

    /// Window byte bounds for a session
    pub fn window_bounds(&self, session: &SessionConfig) -> (usize, usize) {
        (
            session.bytes_for_ms(self.window_min_ms),
            session.bytes_for_ms(self.window_max_ms),
        )
    }

    /// Validate pipeline settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_rate == 0 {
            return Err(ConfigError::InvalidValue {
                field: "pipeline.sample_rate".to_string(),
                message: "Sample rate must be positive".to_string(),
            });
        }

        if self.window_min_ms == 0 || self.window_min_ms > self.window_max_ms {
            return Err(ConfigError::InvalidValue {
                field: "pipeline.window_min_ms".to_string(),
                message: format!(
                    "Window bounds must satisfy 0 < min ({}) <= max ({})",
                    self.window_min_ms, self.window_max_ms
                ),
            });
        }

        if !(0.0..=1.0).contains(&self.energy_gate_rms) {
            return Err(ConfigError::InvalidValue {
                field: "pipeline.energy_gate_rms".to_string(),
                message: "Energy gate must be within [0.0, 1.0]".to_string(),
            });
        }

        if LanguagePreference::parse(Some(&self.default_language)).is_err() {
            return Err(ConfigError::InvalidValue {
                field: "pipeline.default_language".to_string(),
                message: format!("Unsupported language: {}", self.default_language),
            });
        }

        if self.idle_finalize_ms < MIN_IDLE_FINALIZE_MS {
            tracing::warn!(
                configured = self.idle_finalize_ms,
                floor = MIN_IDLE_FINALIZE_MS,
                "Idle finalize deadline below floor, clamping"
            );
        }

        Ok(())
    }
}

/// Thresholds for the candidate sanity filter
///
/// These values were tuned against real traffic and are starting points,
/// not guarantees.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SanityConfig {
    /// Minimum number of visible (non-whitespace) characters
    #[serde(default = "default_min_visible_chars")]
    pub min_visible_chars: usize,

    /// Text without the expected script must be longer than this
    #[serde(default = "default_permissive_min_chars")]
    pub permissive_min_chars: usize,

    /// Generic outputs rejected on exact (case-insensitive) match
    #[serde(default = "default_fillers")]
    pub fillers: Vec<String>,
}

fn default_min_visible_chars() -> usize {
    2
}
fn default_permissive_min_chars() -> usize {
    3
}
fn default_fillers() -> Vec<String> {
    [
        "thank you",
        "thank you for watching",
        "thanks for watching",
        "thanks",
        "bye",
        "goodbye",
        "subscribe",
        "like and subscribe",
        "see you next time",
        "ok",
        "okay",
        "you",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Default for SanityConfig {
    fn default() -> Self {
        Self {
            min_visible_chars: default_min_visible_chars(),
            permissive_min_chars: default_permissive_min_chars(),
            fillers: default_fillers(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use voice_order_core::Language;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.idle_finalize(), Duration::from_millis(1200));
        assert_eq!(config.remote_timeout(), Duration::from_millis(3000));
        assert_eq!(config.default_language(), LanguagePreference::Auto);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_window_bounds() {
        let config = PipelineConfig::default();
        let session = SessionConfig::default();
        assert_eq!(config.window_bounds(&session), (16_000, 64_000));
    }

    #[test]
    fn test_idle_floor() {
        let config = PipelineConfig {
            idle_finalize_ms: 10,
            ..PipelineConfig::default()
        };
        assert_eq!(config.idle_finalize(), Duration::from_millis(MIN_IDLE_FINALIZE_MS));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_window_bounds() {
        let config = PipelineConfig {
            window_min_ms: 3000,
            window_max_ms: 2000,
            ..PipelineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_default_language() {
        let mut config = PipelineConfig::default();
        config.default_language = "bn".to_string();
        assert_eq!(
            config.default_language(),
            LanguagePreference::Explicit(Language::Bengali)
        );

        config.default_language = "xx".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_sanity_defaults_contain_fillers() {
        let sanity = SanityConfig::default();
        assert!(sanity.fillers.iter().any(|f| f == "thank you"));
        assert!(sanity.fillers.iter().any(|f| f == "ok"));
    }
}
