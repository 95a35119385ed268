//! Wire protocol
//!
//! Control messages are JSON objects discriminated by `t`. Audio travels
//! in binary frames of raw little-endian 16-bit PCM.

use serde::{Deserialize, Serialize};
use voice_order_core::{Provenance, TranscriptCandidate};

use crate::TransportError;

/// Unix time in seconds
pub fn unix_ts() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64 / 1000.0
}

/// Session parameters announced by the client
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hello {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    /// Sample rate in Hz
    #[serde(default)]
    pub rate: Option<u32>,
    #[serde(default, alias = "ch")]
    pub channels: Option<u16>,
    /// `bn`, `en`, `auto` or absent
    #[serde(default)]
    pub lang: Option<String>,
    #[serde(default)]
    pub tenant: Option<String>,
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default)]
    pub channel: Option<String>,
}

/// Client → server control messages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ClientMessage {
    Hello(Hello),
    /// Explicit end of utterance
    End,
}

impl ClientMessage {
    /// Parse a control frame; malformed JSON or an unknown `t` is a
    /// protocol violation
    pub fn parse(text: &str) -> Result<Self, TransportError> {
        serde_json::from_str(text).map_err(|e| TransportError::Protocol(e.to_string()))
    }
}

/// Server → client control messages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Handshake accepted
    Ack {
        #[serde(rename = "sessionId")]
        session_id: String,
    },
    /// Low-latency, possibly incomplete transcript
    SttPartial { text: String, ts: f64 },
    /// The one final transcript of the utterance
    SttFinal {
        text: String,
        ts: f64,
        #[serde(rename = "segmentStart")]
        segment_start: Option<f64>,
        #[serde(rename = "segmentEnd")]
        segment_end: Option<f64>,
        source: Provenance,
        lang: String,
    },
    /// Reply from the dialogue collaborator
    Reply { text: String, ts: f64 },
    /// Fatal error; the connection closes after this
    Error { message: String },
}

impl ServerMessage {
    pub fn partial(text: impl Into<String>) -> Self {
        Self::SttPartial {
            text: text.into(),
            ts: unix_ts(),
        }
    }

    pub fn final_transcript(candidate: &TranscriptCandidate, lang: impl Into<String>) -> Self {
        Self::SttFinal {
            text: candidate.text().to_string(),
            ts: unix_ts(),
            segment_start: candidate.segment_start(),
            segment_end: candidate.segment_end(),
            source: candidate.provenance(),
            lang: lang.into(),
        }
    }

    pub fn reply(text: impl Into<String>) -> Self {
        Self::Reply {
            text: text.into(),
            ts: unix_ts(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Value of the `t` discriminant
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Ack { .. } => "ack",
            Self::SttPartial { .. } => "stt_partial",
            Self::SttFinal { .. } => "stt_final",
            Self::Reply { .. } => "reply",
            Self::Error { .. } => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_hello() {
        let msg = ClientMessage::parse(
            r#"{"t":"hello","sessionId":"abc","userId":"u1","rate":16000,"ch":1,"lang":"bn","tenant":"t1"}"#,
        )
        .unwrap();

        let ClientMessage::Hello(hello) = msg else {
            panic!("expected hello");
        };
        assert_eq!(hello.session_id.as_deref(), Some("abc"));
        assert_eq!(hello.user_id.as_deref(), Some("u1"));
        assert_eq!(hello.rate, Some(16000));
        assert_eq!(hello.channels, Some(1));
        assert_eq!(hello.lang.as_deref(), Some("bn"));
        assert_eq!(hello.tenant.as_deref(), Some("t1"));
    }

    #[test]
    fn test_parse_minimal_hello_and_end() {
        assert_eq!(
            ClientMessage::parse(r#"{"t":"hello"}"#).unwrap(),
            ClientMessage::Hello(Hello::default())
        );
        assert_eq!(ClientMessage::parse(r#"{"t":"end"}"#).unwrap(), ClientMessage::End);
    }

    #[test]
    fn test_unknown_type_is_protocol_violation() {
        let err = ClientMessage::parse(r#"{"t":"dance"}"#).unwrap_err();
        assert!(err.is_protocol_violation());

        let err = ClientMessage::parse("not json").unwrap_err();
        assert!(err.is_protocol_violation());
    }

    #[test]
    fn test_server_message_shape() {
        let candidate = TranscriptCandidate::new(
            "two teas",
            vec![(0.25, 1.5)],
            None,
            Provenance::LocalFull,
        );
        let value = serde_json::to_value(ServerMessage::final_transcript(&candidate, "en")).unwrap();

        assert_eq!(value["t"], "stt_final");
        assert_eq!(value["text"], "two teas");
        assert_eq!(value["segmentStart"], 0.25);
        assert_eq!(value["segmentEnd"], 1.5);
        assert_eq!(value["source"], "local_full");
        assert!(value["ts"].as_f64().unwrap() > 0.0);

        let ack = serde_json::to_value(ServerMessage::Ack { session_id: "s".into() }).unwrap();
        assert_eq!(ack, json!({"t": "ack", "sessionId": "s"}));
    }

    #[test]
    fn test_partial_final_without_segments() {
        let candidate = TranscriptCandidate::new("hi there", vec![], None, Provenance::Partial);
        let value = serde_json::to_value(ServerMessage::final_transcript(&candidate, "auto")).unwrap();
        assert!(value["segmentStart"].is_null());
        assert!(value["segmentEnd"].is_null());
    }
}
