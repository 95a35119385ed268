//! Script and language detection

use std::collections::HashMap;

use voice_order_core::{Language, Script};

/// Script-based language detector
///
/// Only characters that belong to a recognized script are counted; digits,
/// punctuation, whitespace and unknown blocks carry no signal.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScriptDetector;

impl ScriptDetector {
    /// Create a new script detector
    pub fn new() -> Self {
        Self
    }

    /// Count characters per recognized script
    pub fn script_counts(&self, text: &str) -> HashMap<Script, usize> {
        let mut counts = HashMap::new();
        for script in text.chars().filter_map(Script::of) {
            *counts.entry(script).or_insert(0) += 1;
        }
        counts
    }

    /// Detect dominant script in text
    ///
    /// Ties resolve in `Script::ALL` order so the result is deterministic.
    pub fn detect_script(&self, text: &str) -> Option<Script> {
        let counts = self.script_counts(text);
        let mut best: Option<(Script, usize)> = None;
        for script in Script::ALL {
            let count = counts.get(&script).copied().unwrap_or(0);
            if count > 0 && best.map_or(true, |(_, c)| count > c) {
                best = Some((script, count));
            }
        }
        best.map(|(script, _)| script)
    }

    /// Infer a language from the dominant script
    pub fn sniff_language(&self, text: &str) -> Option<Language> {
        self.detect_script(text).map(|s| s.primary_language())
    }

    /// Whether any character of `text` is written in `script`
    pub fn contains_script(&self, text: &str, script: Script) -> bool {
        text.chars().any(|c| Script::of(c) == Some(script))
    }

    /// Whether `text` has characters from a recognized script other than `script`
    pub fn has_conflicting_script(&self, text: &str, script: Script) -> bool {
        text.chars()
            .filter_map(Script::of)
            .any(|s| s != script)
    }

    /// Whether `text` has any character from a recognized script
    pub fn contains_any_script(&self, text: &str) -> bool {
        text.chars().any(|c| Script::of(c).is_some())
    }
}
