//! Finalization arbiter
//!
//! Picks the one final transcript for an utterance from an ordered list of
//! tiers. The first tier that yields an acceptable candidate wins:
//!
//! 1. Remote: accurate backend on the full audio, under a time budget
//! 2. Partial: the last good partial, reused without another backend call
//! 3. LocalFull: local backend on the full audio, last resort
//!
//! Per-tier failures are recorded as [`TierAttempt`]s and never propagate.
//! When every tier fails the utterance is abandoned.

use std::fmt;
use std::time::Duration;

use tokio::time::Instant;
use voice_order_config::PipelineConfig;
use voice_order_core::{
    Language, LanguagePreference, PcmAudio, Provenance, TranscriptCandidate, Transcription,
    TranscriptionError,
};
use voice_order_text_processing::{SanityFilter, ScriptDetector};

use crate::stt::Backends;

/// Fixed tier order
pub const TIER_ORDER: [Provenance; 3] = [Provenance::Remote, Provenance::Partial, Provenance::LocalFull];

/// Everything the arbiter needs about one utterance
#[derive(Debug, Clone)]
pub struct FinalizationInput {
    pub session_id: String,
    /// Full utterance audio, including the flushed remainder
    pub audio: PcmAudio,
    /// Last non-empty partial text
    pub last_partial: Option<String>,
    /// Session language hint
    pub hint: LanguagePreference,
    /// Last language reported by a backend
    pub detected_language: Option<Language>,
}

/// Why a tier produced nothing
#[derive(Debug, Clone, PartialEq)]
pub enum TierRejection {
    /// Preconditions not met; the tier did not run
    Skipped(&'static str),
    /// Backend unavailable, timed out or failed
    Backend(TranscriptionError),
    /// Backend ran but returned no text
    EmptyResult,
    /// Text failed the sanity filter
    SanityRejected,
}

impl TierRejection {
    /// Metrics label
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Skipped(_) => "skipped",
            Self::Backend(e) => e.kind(),
            Self::EmptyResult => "empty",
            Self::SanityRejected => "sanity_rejected",
        }
    }
}

impl fmt::Display for TierRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Skipped(reason) => write!(f, "skipped: {}", reason),
            Self::Backend(e) => write!(f, "backend: {}", e),
            Self::EmptyResult => f.write_str("empty result"),
            Self::SanityRejected => f.write_str("sanity rejected"),
        }
    }
}

/// Record of one tier's run
#[derive(Debug, Clone, PartialEq)]
pub struct TierAttempt {
    pub tier: Provenance,
    pub outcome: Result<(), TierRejection>,
    pub elapsed: Duration,
}

/// Outcome of finalization
#[derive(Debug, Clone)]
pub struct FinalizationResult {
    /// Chosen transcript, `None` when the utterance is abandoned
    pub candidate: Option<TranscriptCandidate>,
    /// Language the candidate was accepted under
    pub language: LanguagePreference,
    /// Tiers tried, in order
    pub attempts: Vec<TierAttempt>,
    pub elapsed: Duration,
}

impl FinalizationResult {
    pub fn provenance(&self) -> Option<Provenance> {
        self.candidate.as_ref().map(|c| c.provenance())
    }

    pub fn is_abandoned(&self) -> bool {
        self.candidate.is_none()
    }
}

type TierOutcome = Result<(TranscriptCandidate, LanguagePreference), TierRejection>;

/// End-of-utterance decision maker, shared by all connections
pub struct FinalizationArbiter {
    backends: Backends,
    filter: SanityFilter,
    detector: ScriptDetector,
    remote_timeout: Duration,
    min_final_audio_ms: u64,
}

impl FinalizationArbiter {
    pub fn new(backends: Backends, filter: SanityFilter, config: &PipelineConfig) -> Self {
        Self {
            backends,
            filter,
            detector: ScriptDetector::new(),
            remote_timeout: config.remote_timeout(),
            min_final_audio_ms: config.min_final_audio_ms,
        }
    }

    /// Explicit hint, else last detected language, else the script of the
    /// last partial, else auto
    pub fn resolve_language(&self, input: &FinalizationInput) -> LanguagePreference {
        if !input.hint.is_auto() {
            return input.hint;
        }
        if let Some(lang) = input.detected_language {
            return LanguagePreference::Explicit(lang);
        }
        input
            .last_partial
            .as_deref()
            .and_then(|text| self.detector.sniff_language(text))
            .map(LanguagePreference::Explicit)
            .unwrap_or(LanguagePreference::Auto)
    }

    /// Run the tiers in order and return the first acceptable candidate
    pub async fn finalize(&self, input: FinalizationInput) -> FinalizationResult {
        let start = Instant::now();
        let preference = self.resolve_language(&input);
        let mut attempts = Vec::with_capacity(TIER_ORDER.len());

        tracing::debug!(
            session_id = %input.session_id,
            bytes = input.audio.len_bytes(),
            duration_ms = input.audio.duration_ms(),
            language = %preference,
            has_partial = input.last_partial.is_some(),
            "Finalizing utterance"
        );

        for tier in TIER_ORDER {
            let tier_start = Instant::now();
            let outcome = match tier {
                Provenance::Remote => self.remote_tier(&input, preference).await,
                Provenance::Partial => self.partial_tier(&input, preference),
                Provenance::LocalFull => self.local_tier(&input, preference).await,
            };
            let elapsed = tier_start.elapsed();

            match outcome {
                Ok((candidate, language)) => {
                    attempts.push(TierAttempt {
                        tier,
                        outcome: Ok(()),
                        elapsed,
                    });
                    tracing::info!(
                        session_id = %input.session_id,
                        tier = %tier,
                        language = %language,
                        chars = candidate.text().len(),
                        elapsed_ms = start.elapsed().as_millis() as u64,
                        "Final transcript selected"
                    );
                    return FinalizationResult {
                        candidate: Some(candidate),
                        language,
                        attempts,
                        elapsed: start.elapsed(),
                    };
                }
                Err(rejection) => {
                    tracing::debug!(
                        session_id = %input.session_id,
                        tier = %tier,
                        %rejection,
                        elapsed_ms = elapsed.as_millis() as u64,
                        "Tier produced no candidate"
                    );
                    attempts.push(TierAttempt {
                        tier,
                        outcome: Err(rejection),
                        elapsed,
                    });
                }
            }
        }

        tracing::info!(session_id = %input.session_id, "No usable transcript, utterance abandoned");
        FinalizationResult {
            candidate: None,
            language: preference,
            attempts,
            elapsed: start.elapsed(),
        }
    }

    /// Full-audio remote pass with at most one language retry
    ///
    /// When the retry produced the accepted text, sanity is judged under the
    /// retry language rather than the resolved preference, and that language
    /// becomes the effective one for the final.
    async fn remote_tier(&self, input: &FinalizationInput, preference: LanguagePreference) -> TierOutcome {
        let Some(remote) = self.backends.remote.as_ref() else {
            return Err(TierRejection::Skipped("not configured"));
        };
        if input.audio.duration_ms() < self.min_final_audio_ms {
            return Err(TierRejection::Skipped("audio too short"));
        }

        let deadline = Instant::now() + self.remote_timeout;
        let first = remote
            .transcribe_within(&input.audio, preference.language(), self.remote_timeout)
            .await
            .map_err(TierRejection::Backend)?;

        let mut accepted = first;
        let mut effective = preference;

        if let Some(retry_lang) = self.retry_language(&accepted, preference) {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                tracing::debug!(session_id = %input.session_id, "No budget left for language retry");
            } else {
                tracing::debug!(
                    session_id = %input.session_id,
                    expected = %preference,
                    retry = %retry_lang,
                    "Script mismatch, retrying remote with detected language"
                );
                match remote
                    .transcribe_within(&input.audio, Some(retry_lang), remaining)
                    .await
                {
                    Ok(retry) if !retry.is_empty() => {
                        accepted = retry;
                        effective = LanguagePreference::Explicit(retry_lang);
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::debug!(session_id = %input.session_id, error = %e, "Language retry failed");
                    }
                }
            }
        }

        if accepted.is_empty() {
            return Err(TierRejection::EmptyResult);
        }
        if !self.filter.looks_sane(&accepted.text, effective) {
            return Err(TierRejection::SanityRejected);
        }

        let language = accepted.detected_language.or(effective.language());
        let candidate = TranscriptCandidate::new(
            accepted.text,
            accepted.segments,
            language,
            Provenance::Remote,
        );
        Ok((candidate, effective))
    }

    /// Language to force on retry when a forced-language result came back
    /// entirely in another script
    fn retry_language(&self, result: &Transcription, preference: LanguagePreference) -> Option<Language> {
        let expected = preference.language()?;
        let script = expected.script();
        if result.is_empty()
            || self.detector.contains_script(&result.text, script)
            || !self.detector.has_conflicting_script(&result.text, script)
        {
            return None;
        }
        self.detector
            .sniff_language(&result.text)
            .filter(|lang| *lang != expected)
    }

    fn partial_tier(&self, input: &FinalizationInput, preference: LanguagePreference) -> TierOutcome {
        let Some(text) = input.last_partial.as_deref() else {
            return Err(TierRejection::Skipped("no partial"));
        };
        if !self.filter.looks_sane(text, preference) {
            return Err(TierRejection::SanityRejected);
        }

        let candidate = TranscriptCandidate::new(
            text,
            Vec::new(),
            preference.language().or(input.detected_language),
            Provenance::Partial,
        );
        Ok((candidate, preference))
    }

    async fn local_tier(&self, input: &FinalizationInput, preference: LanguagePreference) -> TierOutcome {
        let Some(local) = self.backends.local.as_ref() else {
            return Err(TierRejection::Skipped("not configured"));
        };
        if input.audio.duration_ms() < self.min_final_audio_ms {
            return Err(TierRejection::Skipped("audio too short"));
        }

        let result = local
            .transcribe(&input.audio, preference.language())
            .await
            .map_err(TierRejection::Backend)?;
        if result.is_empty() {
            return Err(TierRejection::EmptyResult);
        }

        let language = result.detected_language.or(preference.language());
        let candidate = TranscriptCandidate::new(
            result.text,
            result.segments,
            language,
            Provenance::LocalFull,
        );
        Ok((candidate, preference))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stt::testing::ScriptedBackend;
    use crate::stt::SttBackend;
    use std::sync::Arc;

    fn audio_ms(ms: u64) -> PcmAudio {
        PcmAudio::new(vec![1u8; (ms * 32) as usize], 16_000)
    }

    fn input(partial: Option<&str>, hint: LanguagePreference) -> FinalizationInput {
        FinalizationInput {
            session_id: "s1".to_string(),
            audio: audio_ms(1500),
            last_partial: partial.map(str::to_string),
            hint,
            detected_language: None,
        }
    }

    fn arbiter(local: Option<Arc<ScriptedBackend>>, remote: Option<Arc<ScriptedBackend>>) -> FinalizationArbiter {
        let backends = Backends {
            local: local.map(|b| b as Arc<dyn SttBackend>),
            remote: remote.map(|b| b as Arc<dyn SttBackend>),
        };
        FinalizationArbiter::new(backends, SanityFilter::default(), &PipelineConfig::default())
    }

    fn bn() -> LanguagePreference {
        LanguagePreference::Explicit(Language::Bengali)
    }

    #[tokio::test(start_paused = true)]
    async fn test_remote_timeout_falls_back_to_partial() {
        let remote = Arc::new(ScriptedBackend::new("remote").then_after(
            Duration::from_secs(10),
            Ok(Transcription::new("two burgers please")),
        ));
        let local = Arc::new(ScriptedBackend::new("local").then_text("should not run"));
        let arbiter = arbiter(Some(local.clone()), Some(remote));

        let result = arbiter
            .finalize(input(Some("two burgers"), LanguagePreference::Auto))
            .await;

        assert_eq!(result.provenance(), Some(Provenance::Partial));
        assert_eq!(result.candidate.unwrap().text(), "two burgers");
        assert_eq!(
            result.attempts[0].outcome,
            Err(TierRejection::Backend(TranscriptionError::Timeout(Duration::from_secs(3))))
        );
        assert_eq!(local.call_count(), 0);
    }

    #[tokio::test]
    async fn test_remote_result_wins_with_segments() {
        let remote = Arc::new(ScriptedBackend::new("remote").then(Ok(Transcription::new("দুটো বার্গার")
            .with_segments(vec![(0.1, 0.6), (0.7, 1.4)])
            .with_language(Language::Bengali))));
        let arbiter = arbiter(None, Some(remote.clone()));

        let result = arbiter.finalize(input(Some("দুটো"), bn())).await;
        let candidate = result.candidate.unwrap();

        assert_eq!(candidate.provenance(), Provenance::Remote);
        assert_eq!(candidate.segment_start(), Some(0.1));
        assert_eq!(candidate.segment_end(), Some(1.4));
        assert_eq!(remote.calls()[0].language, Some(Language::Bengali));
        assert_eq!(result.attempts.len(), 1);
    }

    #[tokio::test]
    async fn test_script_mismatch_retries_once() {
        let remote = Arc::new(
            ScriptedBackend::new("remote")
                .then_text("two burger")
                .then_text_in("two burgers please", Language::English),
        );
        let arbiter = arbiter(None, Some(remote.clone()));

        let result = arbiter.finalize(input(None, bn())).await;

        let calls = remote.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].language, Some(Language::Bengali));
        assert_eq!(calls[1].language, Some(Language::English));
        assert_eq!(result.language, LanguagePreference::Explicit(Language::English));
        assert_eq!(result.candidate.unwrap().text(), "two burgers please");
    }

    #[tokio::test]
    async fn test_empty_retry_keeps_first_result() {
        let remote = Arc::new(
            ScriptedBackend::new("remote")
                .then_text("two burgers")
                .then_text(""),
        );
        let arbiter = arbiter(None, Some(remote.clone()));

        let result = arbiter.finalize(input(Some("দুটো বার্গার"), bn())).await;

        // First result conflicts with Bengali, so it fails the sanity check
        // and the Bengali partial is used instead
        assert_eq!(remote.call_count(), 2);
        assert_eq!(result.attempts[0].outcome, Err(TierRejection::SanityRejected));
        assert_eq!(result.provenance(), Some(Provenance::Partial));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_skipped_when_budget_spent() {
        // First call returns exactly at the remote timeout
        let remote = Arc::new(
            ScriptedBackend::new("remote")
                .then_after(Duration::from_secs(3), Ok(Transcription::new("two burgers")))
                .then_text_in("two burgers please", Language::English),
        );
        let arbiter = arbiter(None, Some(remote.clone()));

        let result = arbiter.finalize(input(Some("দুটো বার্গার"), bn())).await;

        assert_eq!(remote.call_count(), 1);
        assert_eq!(result.attempts[0].outcome, Err(TierRejection::SanityRejected));
        assert_eq!(result.provenance(), Some(Provenance::Partial));
        assert_eq!(result.language, bn());
    }

    #[tokio::test]
    async fn test_filler_rejected_at_remote_tier() {
        let remote = Arc::new(ScriptedBackend::new("remote").then_text("Thank you."));
        let local = Arc::new(ScriptedBackend::new("local").then_text("one masala tea"));
        let arbiter = arbiter(Some(local), Some(remote));

        let result = arbiter.finalize(input(None, LanguagePreference::Auto)).await;

        assert_eq!(result.provenance(), Some(Provenance::LocalFull));
        assert_eq!(result.attempts[0].outcome, Err(TierRejection::SanityRejected));
        assert_eq!(result.attempts[1].outcome, Err(TierRejection::Skipped("no partial")));
    }

    #[tokio::test]
    async fn test_local_full_pass_without_sanity_gate() {
        let local = Arc::new(ScriptedBackend::new("local").then_text("ok"));
        let arbiter = arbiter(Some(local.clone()), None);

        let result = arbiter.finalize(input(Some("bye"), LanguagePreference::Auto)).await;

        assert_eq!(result.provenance(), Some(Provenance::LocalFull));
        assert_eq!(local.calls()[0].bytes, 1500 * 32);
    }

    #[tokio::test]
    async fn test_abandoned_when_nothing_usable() {
        let local = Arc::new(ScriptedBackend::new("local").then_text("  "));
        let arbiter = arbiter(Some(local), None);

        let result = arbiter.finalize(input(None, LanguagePreference::Auto)).await;

        assert!(result.is_abandoned());
        assert_eq!(result.attempts.len(), 3);
        assert_eq!(result.attempts[2].outcome, Err(TierRejection::EmptyResult));
    }

    #[tokio::test]
    async fn test_short_audio_skips_backend_tiers() {
        let remote = Arc::new(ScriptedBackend::new("remote").then_text("two teas"));
        let local = Arc::new(ScriptedBackend::new("local").then_text("two teas"));
        let arbiter = arbiter(Some(local.clone()), Some(remote.clone()));

        let mut short = input(None, LanguagePreference::Auto);
        short.audio = audio_ms(200);
        let result = arbiter.finalize(short).await;

        assert!(result.is_abandoned());
        assert_eq!(remote.call_count(), 0);
        assert_eq!(local.call_count(), 0);
    }

    #[test]
    fn test_resolve_language_order() {
        let arbiter = arbiter(None, None);

        let mut i = input(Some("আমি চা চাই"), LanguagePreference::Explicit(Language::English));
        assert_eq!(arbiter.resolve_language(&i), LanguagePreference::Explicit(Language::English));

        i.hint = LanguagePreference::Auto;
        i.detected_language = Some(Language::Hindi);
        assert_eq!(arbiter.resolve_language(&i), LanguagePreference::Explicit(Language::Hindi));

        i.detected_language = None;
        assert_eq!(arbiter.resolve_language(&i), bn());

        i.last_partial = Some("123".to_string());
        assert_eq!(arbiter.resolve_language(&i), LanguagePreference::Auto);
    }
}
