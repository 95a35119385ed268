//! Transcript types for STT output

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::language::Language;

/// Timing segment in seconds from the start of the transcribed audio
pub type Segment = (f64, f64);

/// Raw output of one backend call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transcription {
    /// Transcribed text, trimmed
    pub text: String,

    /// Per-segment timing, in order
    pub segments: Vec<Segment>,

    /// Language reported by the backend
    pub detected_language: Option<Language>,
}

impl Transcription {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into().trim().to_string(),
            segments: Vec::new(),
            detected_language: None,
        }
    }

    pub fn with_segments(mut self, segments: Vec<Segment>) -> Self {
        self.segments = segments;
        self
    }

    pub fn with_language(mut self, language: Language) -> Self {
        self.detected_language = Some(language);
        self
    }

    /// Check if transcript is empty
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Which strategy produced a transcript
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// Remote high-accuracy backend at finalization
    Remote,
    /// Last good low-latency partial, reused as is
    Partial,
    /// Local backend over the full utterance audio
    LocalFull,
}

impl Provenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Remote => "remote",
            Self::Partial => "partial",
            Self::LocalFull => "local_full",
        }
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Candidate transcript, read-only once built
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptCandidate {
    text: String,
    segments: Vec<Segment>,
    language: Option<Language>,
    provenance: Provenance,
}

impl TranscriptCandidate {
    pub fn new(
        text: impl Into<String>,
        segments: Vec<Segment>,
        language: Option<Language>,
        provenance: Provenance,
    ) -> Self {
        Self {
            text: text.into(),
            segments,
            language,
            provenance,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn language(&self) -> Option<Language> {
        self.language
    }

    pub fn provenance(&self) -> Provenance {
        self.provenance
    }

    /// Start of the first segment
    pub fn segment_start(&self) -> Option<f64> {
        self.segments.first().map(|(start, _)| *start)
    }

    /// End of the last segment
    pub fn segment_end(&self) -> Option<f64> {
        self.segments.last().map(|(_, end)| *end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transcription_trims_text() {
        let t = Transcription::new("  hello world \n");
        assert_eq!(t.text, "hello world");
        assert!(!t.is_empty());
        assert!(Transcription::new("   ").is_empty());
    }

    #[test]
    fn test_candidate_segment_bounds() {
        let candidate = TranscriptCandidate::new(
            "two burgers please",
            vec![(0.2, 1.1), (1.3, 2.4)],
            Some(Language::English),
            Provenance::Remote,
        );

        assert_eq!(candidate.segment_start(), Some(0.2));
        assert_eq!(candidate.segment_end(), Some(2.4));
        assert_eq!(candidate.language(), Some(Language::English));
        assert_eq!(candidate.provenance(), Provenance::Remote);
    }

    #[test]
    fn test_candidate_without_segments() {
        let candidate = TranscriptCandidate::new("hi there", Vec::new(), None, Provenance::Partial);
        assert_eq!(candidate.segment_start(), None);
        assert_eq!(candidate.segment_end(), None);
    }

    #[test]
    fn test_provenance_serde() {
        assert_eq!(
            serde_json::to_string(&Provenance::LocalFull).unwrap(),
            "\"local_full\""
        );
        assert_eq!(Provenance::Partial.to_string(), "partial");
    }
}
