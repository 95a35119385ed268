//! Core types for the voice-order front end
//!
//! This crate provides foundational types used across all other crates:
//! - Raw PCM audio and its signal measurements
//! - Languages, scripts and language preferences
//! - Transcript candidates and their provenance
//! - Session configuration and connection states
//! - Error types

pub mod audio;
pub mod error;
pub mod language;
pub mod session;
pub mod transcript;

pub use audio::{PcmAudio, BYTES_PER_SAMPLE, DEFAULT_SAMPLE_RATE};
pub use error::{Error, Result, TranscriptionError};
pub use language::{Language, LanguagePreference, Script};
pub use session::{ConnectionState, SessionConfig};
pub use transcript::{Provenance, Segment, Transcription, TranscriptCandidate};
