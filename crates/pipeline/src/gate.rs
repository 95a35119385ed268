//! Window gating
//!
//! Cheap checks run before a window reaches a backend. Near-silent input is
//! where models hallucinate, and short windows rarely carry a word.

use std::fmt;

use voice_order_core::PcmAudio;

/// Why a window was not transcribed
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SkipReason {
    TooShort { bytes: usize },
    Silent { rms: f32 },
}

impl SkipReason {
    /// Metrics label
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TooShort { .. } => "too_short",
            Self::Silent { .. } => "silent",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooShort { bytes } => write!(f, "too short ({} bytes)", bytes),
            Self::Silent { rms } => write!(f, "silent (rms {:.4})", rms),
        }
    }
}

/// Size and energy gate for windows
#[derive(Debug, Clone, Copy)]
pub struct WindowGate {
    min_bytes: usize,
    energy_threshold: f32,
}

impl WindowGate {
    pub fn new(min_bytes: usize, energy_threshold: f32) -> Self {
        Self {
            min_bytes,
            energy_threshold,
        }
    }

    /// `Ok` if the window is worth transcribing
    pub fn check(&self, audio: &PcmAudio) -> Result<(), SkipReason> {
        let bytes = audio.len_bytes();
        if bytes < self.min_bytes {
            return Err(SkipReason::TooShort { bytes });
        }

        let rms = audio.rms();
        if rms < self.energy_threshold {
            return Err(SkipReason::Silent { rms });
        }

        Ok(())
    }
}
