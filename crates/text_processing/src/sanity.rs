//! Transcript plausibility checks
//!
//! Transcription models hallucinate on silence and noise: short generic
//! phrases ("thank you", "bye") or text in the wrong script. The same
//! filter runs on every finalization tier.

use std::collections::HashSet;

use voice_order_config::SanityConfig;
use voice_order_core::LanguagePreference;

use crate::script::ScriptDetector;

/// Heuristic acceptance test for a transcript
#[derive(Debug, Clone)]
pub struct SanityFilter {
    min_visible_chars: usize,
    permissive_min_chars: usize,
    fillers: HashSet<String>,
    detector: ScriptDetector,
}

impl SanityFilter {
    pub fn new(config: &SanityConfig) -> Self {
        Self {
            min_visible_chars: config.min_visible_chars,
            permissive_min_chars: config.permissive_min_chars,
            fillers: config
                .fillers
                .iter()
                .map(|f| normalize(f))
                .filter(|f| !f.is_empty())
                .collect(),
            detector: ScriptDetector::new(),
        }
    }

    /// Whether `text` is a plausible transcript under `expected`
    pub fn looks_sane(&self, text: &str, expected: LanguagePreference) -> bool {
        let trimmed = text.trim();

        let visible = trimmed.chars().filter(|c| !c.is_whitespace()).count();
        if visible < self.min_visible_chars {
            tracing::debug!(visible, "Transcript rejected: too short");
            return false;
        }

        if self.is_filler(trimmed) {
            tracing::debug!(text = trimmed, "Transcript rejected: filler");
            return false;
        }

        let sane = match expected {
            LanguagePreference::Explicit(lang) => {
                let script = lang.script();
                if self.detector.contains_script(trimmed, script) {
                    return true;
                }
                // No expected-script characters: tolerate script-neutral text
                // (numbers, brand names in an unknown block) only when long enough.
                !self.detector.has_conflicting_script(trimmed, script)
                    && trimmed.chars().count() > self.permissive_min_chars
            }
            LanguagePreference::Auto => self.detector.contains_any_script(trimmed),
        };
        if !sane {
            tracing::debug!(expected = %expected, "Transcript rejected: script mismatch");
        }
        sane
    }

    /// Exact (case-insensitive) match against the filler list
    pub fn is_filler(&self, text: &str) -> bool {
        self.fillers.contains(&normalize(text))
    }
}

impl Default for SanityFilter {
    fn default() -> Self {
        Self::new(&SanityConfig::default())
    }
}

/// Lowercase and strip surrounding whitespace and ASCII punctuation
fn normalize(text: &str) -> String {
    text.trim_matches(|c: char| c.is_whitespace() || c.is_ascii_punctuation())
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use voice_order_core::Language;

    fn bn() -> LanguagePreference {
        LanguagePreference::Explicit(Language::Bengali)
    }

    fn en() -> LanguagePreference {
        LanguagePreference::Explicit(Language::English)
    }

    #[test]
    fn test_rejects_empty_and_short() {
        let filter = SanityFilter::default();

        assert!(!filter.looks_sane("", bn()));
        assert!(!filter.looks_sane("   ", LanguagePreference::Auto));
        assert!(!filter.looks_sane("a", en()));
    }

    #[test]
    fn test_rejects_fillers() {
        let filter = SanityFilter::default();

        assert!(!filter.looks_sane("ok", en()));
        assert!(!filter.looks_sane("Thank you.", en()));
        assert!(!filter.looks_sane("  BYE!  ", LanguagePreference::Auto));
        // Not an exact match
        assert!(filter.looks_sane("thank you for the coffee", en()));
    }

    #[test]
    fn test_accepts_target_script() {
        let filter = SanityFilter::default();

        assert!(filter.looks_sane("আমিচাচা", bn()));
        assert!(filter.looks_sane("দুটো burger", bn()));
        assert!(filter.looks_sane("two burgers", en()));
    }

    #[test]
    fn test_rejects_conflicting_script() {
        let filter = SanityFilter::default();

        assert!(!filter.looks_sane("two burgers please", bn()));
        assert!(!filter.looks_sane("আমি চা চাই", en()));
    }

    #[test]
    fn test_permissive_fallback() {
        let filter = SanityFilter::default();

        // Script-neutral text passes only when longer than the threshold
        assert!(filter.looks_sane("12345", bn()));
        assert!(!filter.looks_sane("123", bn()));
    }

    #[test]
    fn test_auto_requires_any_script() {
        let filter = SanityFilter::default();

        assert!(filter.looks_sane("two burgers", LanguagePreference::Auto));
        assert!(filter.looks_sane("চা চাই", LanguagePreference::Auto));
        assert!(!filter.looks_sane("12345", LanguagePreference::Auto));
        assert!(!filter.looks_sane("... !!", LanguagePreference::Auto));
    }

    #[test]
    fn test_custom_config() {
        let config = SanityConfig {
            min_visible_chars: 4,
            permissive_min_chars: 3,
            fillers: vec!["Hmm".to_string()],
        };
        let filter = SanityFilter::new(&config);

        assert!(!filter.looks_sane("hi!", en()));
        assert!(!filter.looks_sane("hmm.", en()));
        assert!(filter.looks_sane("okay then", en()));
    }
}
