//! Dialogue hand-off
//!
//! Every finalized utterance is passed to a dialogue collaborator, which
//! may answer with reply text for the client.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use voice_order_config::DialogueConfig;
use voice_order_core::{LanguagePreference, Provenance, SessionConfig, TranscriptCandidate};

/// Dialogue errors
#[derive(Error, Debug)]
pub enum DialogueError {
    #[error("Dialogue request error: {0}")]
    Request(String),

    #[error("Dialogue timed out after {0:?}")]
    Timeout(Duration),

    #[error("Invalid dialogue response: {0}")]
    InvalidResponse(String),
}

/// Finalized utterance as seen by the dialogue collaborator
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UtteranceHandoff {
    pub text: String,
    pub provenance: Provenance,
    pub session_id: String,
    pub user_id: String,
    pub language: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
}

impl UtteranceHandoff {
    pub fn new(
        session: &SessionConfig,
        candidate: &TranscriptCandidate,
        language: LanguagePreference,
    ) -> Self {
        Self {
            text: candidate.text().to_string(),
            provenance: candidate.provenance(),
            session_id: session.session_id.clone(),
            user_id: session.user_id.clone(),
            language: language.as_str().to_string(),
            tenant: session.tenant.clone(),
            branch: session.branch.clone(),
            channel: session.channel.clone(),
        }
    }
}

/// Downstream consumer of finalized utterances
#[async_trait]
pub trait DialogueHandler: Send + Sync {
    /// Returns reply text for the client, if any
    async fn handle(&self, handoff: &UtteranceHandoff) -> Result<Option<String>, DialogueError>;
}

/// Logs the hand-off and never replies
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopDialogue;

#[async_trait]
impl DialogueHandler for NoopDialogue {
    async fn handle(&self, handoff: &UtteranceHandoff) -> Result<Option<String>, DialogueError> {
        tracing::info!(
            session_id = %handoff.session_id,
            source = handoff.provenance.as_str(),
            lang = %handoff.language,
            text = %handoff.text,
            "Utterance finalized"
        );
        Ok(None)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DialogueReply {
    #[serde(default)]
    reply_text: Option<String>,
}

/// POSTs the hand-off as JSON and reads `replyText` from the response
pub struct HttpDialogue {
    client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

impl HttpDialogue {
    pub fn new(client: reqwest::Client, endpoint: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            timeout,
        }
    }

    /// `HttpDialogue` when an endpoint is configured, `NoopDialogue` otherwise
    pub fn from_config(config: &DialogueConfig) -> Arc<dyn DialogueHandler> {
        match config.endpoint.as_deref().map(str::trim) {
            Some(endpoint) if !endpoint.is_empty() => {
                tracing::info!(endpoint, "Dialogue hand-off over HTTP");
                Arc::new(Self::new(reqwest::Client::new(), endpoint, config.timeout()))
            }
            _ => Arc::new(NoopDialogue),
        }
    }
}

#[async_trait]
impl DialogueHandler for HttpDialogue {
    async fn handle(&self, handoff: &UtteranceHandoff) -> Result<Option<String>, DialogueError> {
        let request = async {
            let response = self
                .client
                .post(&self.endpoint)
                .json(handoff)
                .send()
                .await
                .map_err(|e| DialogueError::Request(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                return Err(DialogueError::Request(format!("HTTP {}", status)));
            }

            let body: DialogueReply = response
                .json()
                .await
                .map_err(|e| DialogueError::InvalidResponse(e.to_string()))?;
            Ok(body
                .reply_text
                .map(|text| text.trim().to_string())
                .filter(|text| !text.is_empty()))
        };

        tokio::time::timeout(self.timeout, request)
            .await
            .map_err(|_| DialogueError::Timeout(self.timeout))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use voice_order_core::Language;

    #[test]
    fn test_handoff_shape() {
        let mut session = SessionConfig::new("s1", "u1");
        session.branch = Some("dhanmondi".to_string());
        let candidate = TranscriptCandidate::new("দুটো চা", vec![], None, Provenance::Partial);

        let handoff = UtteranceHandoff::new(&session, &candidate, Language::Bengali.into());
        let value = serde_json::to_value(&handoff).unwrap();

        assert_eq!(value["text"], "দুটো চা");
        assert_eq!(value["provenance"], "partial");
        assert_eq!(value["sessionId"], "s1");
        assert_eq!(value["userId"], "u1");
        assert_eq!(value["language"], "bn");
        assert_eq!(value["branch"], "dhanmondi");
        assert!(value.get("tenant").is_none());
    }

    #[test]
    fn test_reply_parsing() {
        let reply: DialogueReply = serde_json::from_str(r#"{"replyText":"Two teas, anything else?"}"#).unwrap();
        assert_eq!(reply.reply_text.as_deref(), Some("Two teas, anything else?"));

        let reply: DialogueReply = serde_json::from_str("{}").unwrap();
        assert!(reply.reply_text.is_none());
    }

    #[tokio::test]
    async fn test_noop_never_replies() {
        let session = SessionConfig::new("s1", "guest");
        let candidate = TranscriptCandidate::new("one coffee", vec![], None, Provenance::Remote);
        let handoff = UtteranceHandoff::new(&session, &candidate, LanguagePreference::Auto);

        assert_eq!(NoopDialogue.handle(&handoff).await.unwrap(), None);
    }

    #[test]
    fn test_from_config_without_endpoint() {
        // Falls back to the no-op handler; nothing to assert beyond construction
        let _handler = HttpDialogue::from_config(&DialogueConfig::default());
    }
}
