//! Per-utterance transcript record

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use voice_order_core::{LanguagePreference, Provenance, Segment, SessionConfig, TranscriptCandidate};

/// Export status of a freshly written record
pub const STATUS_NEW: &str = "new";

/// Audit record for one finalized utterance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptRecord {
    pub user: String,
    pub session: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    pub text: String,
    pub segments: Vec<Segment>,
    pub provenance: Provenance,
    /// Language the transcript was accepted under (`auto` when unknown)
    pub language: String,
    pub ts: DateTime<Utc>,
    pub status: String,
}

impl TranscriptRecord {
    pub fn new(
        session: &SessionConfig,
        candidate: &TranscriptCandidate,
        language: LanguagePreference,
    ) -> Self {
        Self {
            user: session.user_id.clone(),
            session: session.session_id.clone(),
            tenant: session.tenant.clone(),
            branch: session.branch.clone(),
            channel: session.channel.clone(),
            text: candidate.text().to_string(),
            segments: candidate.segments().to_vec(),
            provenance: candidate.provenance(),
            language: language.as_str().to_string(),
            ts: Utc::now(),
            status: STATUS_NEW.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use voice_order_core::Language;

    #[test]
    fn test_record_from_candidate() {
        let mut session = SessionConfig::new("s1", "u1");
        session.tenant = Some("cafe".to_string());
        let candidate = TranscriptCandidate::new(
            "দুটো চা",
            vec![(0.0, 1.2)],
            Some(Language::Bengali),
            Provenance::Remote,
        );

        let record = TranscriptRecord::new(&session, &candidate, Language::Bengali.into());

        assert_eq!(record.user, "u1");
        assert_eq!(record.session, "s1");
        assert_eq!(record.language, "bn");
        assert_eq!(record.status, STATUS_NEW);

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["provenance"], "remote");
        assert_eq!(value["tenant"], "cafe");
        assert!(value.get("branch").is_none());
    }
}
