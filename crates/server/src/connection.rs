//! Connection lifecycle
//!
//! Drives one client connection through
//! `Handshaking → Streaming → Closing → Finalizing → Done`.
//!
//! The receive loop owns all per-connection state. Windows go to the
//! streaming worker through a freshest-wins slot; partials come back on a
//! channel. Only client frames re-arm the idle deadline.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};
use voice_order_config::{PipelineConfig, RateLimitConfig, Settings};
use voice_order_core::{ConnectionState, Language, LanguagePreference, PcmAudio, SessionConfig};
use voice_order_persistence::{TranscriptRecord, TranscriptWriter};
use voice_order_pipeline::{
    BackendFactory, Backends, FinalizationArbiter, FinalizationInput, FinalizationResult,
    Segmenter, SlotSend, StreamingWorker, WindowGate, WorkerEvent, WorkerHandle, WorkerStats,
};
use voice_order_text_processing::SanityFilter;
use voice_order_transport::{ClientMessage, Hello, Inbound, MessageTransport, ServerMessage, TransportError};

use crate::dialogue::{DialogueHandler, HttpDialogue, UtteranceHandoff};
use crate::metrics;
use crate::rate_limit::RateLimiter;
use crate::registry::ConnectionEntry;
use crate::ServerError;

/// Accepted sample rates
const SAMPLE_RATE_RANGE: std::ops::RangeInclusive<u32> = 8_000..=48_000;

/// Partials buffered between the worker and the receive loop
const EVENT_CAPACITY: usize = 8;

/// Shared services handed to every connection
pub struct ConnectionServices {
    pub pipeline: PipelineConfig,
    pub handshake_timeout: Duration,
    pub rate_limit: RateLimitConfig,
    pub backends: Backends,
    pub arbiter: Arc<FinalizationArbiter>,
    pub dialogue: Arc<dyn DialogueHandler>,
    pub writer: Option<Arc<TranscriptWriter>>,
}

impl ConnectionServices {
    pub fn new(
        settings: &Settings,
        backends: Backends,
        dialogue: Arc<dyn DialogueHandler>,
        writer: Option<Arc<TranscriptWriter>>,
    ) -> Self {
        let arbiter = FinalizationArbiter::new(
            backends.clone(),
            SanityFilter::new(&settings.sanity),
            &settings.pipeline,
        );

        Self {
            pipeline: settings.pipeline.clone(),
            handshake_timeout: settings.server.handshake_timeout(),
            rate_limit: settings.server.rate_limit.clone(),
            backends,
            arbiter: Arc::new(arbiter),
            dialogue,
            writer,
        }
    }

    /// Build backends, dialogue hand-off and transcript writer from settings
    pub fn from_settings(settings: &Settings) -> Result<Self, ServerError> {
        let backends = BackendFactory::from_config(&settings.backends)?;
        let dialogue = HttpDialogue::from_config(&settings.dialogue);
        let writer = voice_order_persistence::init(&settings.persistence).map(Arc::new);
        Ok(Self::new(settings, backends, dialogue, writer))
    }
}

/// Why a connection left `Streaming` (or never reached it)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndReason {
    /// No `hello` within the handshake timeout
    HandshakeTimeout,
    /// `end` received before `hello`
    EndBeforeHello,
    /// Malformed control message or invalid `hello`
    ProtocolViolation(String),
    /// Client sent `end`
    EndMessage,
    /// No client message within the idle deadline
    IdleTimeout,
    /// Peer went away
    Disconnected,
    /// Sending to the peer failed
    SendFailed,
    /// Utterance reached the configured maximum length
    MaxDuration,
}

impl EndReason {
    /// Metrics label
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HandshakeTimeout => "handshake_timeout",
            Self::EndBeforeHello => "end_before_hello",
            Self::ProtocolViolation(_) => "protocol_violation",
            Self::EndMessage => "end",
            Self::IdleTimeout => "idle_timeout",
            Self::Disconnected => "disconnected",
            Self::SendFailed => "send_failed",
            Self::MaxDuration => "max_duration",
        }
    }

    /// Whether streamed audio is finalized after this reason
    pub fn finalizes(&self) -> bool {
        !matches!(
            self,
            Self::HandshakeTimeout | Self::EndBeforeHello | Self::ProtocolViolation(_)
        )
    }
}

/// Summary of a finished connection
#[derive(Debug)]
pub struct ConnectionOutcome {
    pub session_id: Option<String>,
    pub end_reason: EndReason,
    /// States visited, in order
    pub states: Vec<ConnectionState>,
    /// Arbiter result; `None` when finalization never ran
    pub finalization: Option<FinalizationResult>,
    pub partials_sent: usize,
    pub worker_stats: Option<WorkerStats>,
}

/// Build the session from a `hello` message
///
/// Mono only, rate within 8–48 kHz. An unsupported language hint falls
/// back to the configured default.
pub fn session_from_hello(hello: Hello, pipeline: &PipelineConfig) -> Result<SessionConfig, String> {
    let channels = hello.channels.unwrap_or(1);
    if channels != 1 {
        return Err(format!("only mono audio is supported (channels={})", channels));
    }

    let sample_rate = hello.rate.unwrap_or(pipeline.sample_rate);
    if !SAMPLE_RATE_RANGE.contains(&sample_rate) {
        return Err(format!("unsupported sample rate {}", sample_rate));
    }

    let language = match hello.lang.as_deref().map(str::trim).filter(|l| !l.is_empty()) {
        None => pipeline.default_language(),
        Some(hint) => LanguagePreference::parse(Some(hint)).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Falling back to default language");
            pipeline.default_language()
        }),
    };

    let mut session = SessionConfig::default();
    if let Some(id) = non_empty(hello.session_id) {
        session.session_id = id;
    }
    if let Some(user) = non_empty(hello.user_id) {
        session.user_id = user;
    }
    session.sample_rate = sample_rate;
    session.channels = channels;
    session.language = language;
    session.idle_finalize = pipeline.idle_finalize();
    session.tenant = non_empty(hello.tenant);
    session.branch = non_empty(hello.branch);
    session.channel = non_empty(hello.channel);
    Ok(session)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Per-utterance state, owned by the receive loop
struct Utterance {
    segmenter: Segmenter,
    audio: PcmAudio,
    max_bytes: usize,
    worker: Option<WorkerHandle>,
    events: Option<mpsc::Receiver<WorkerEvent>>,
    last_partial: Option<String>,
    detected_language: Option<Language>,
}

impl Utterance {
    fn new(session: &SessionConfig, services: &ConnectionServices) -> Self {
        let (min_bytes, max_bytes) = services.pipeline.window_bounds(session);
        let (worker, events) = match &services.backends.local {
            Some(backend) => {
                let worker = StreamingWorker::new(
                    session.session_id.clone(),
                    Arc::clone(backend),
                    WindowGate::new(services.pipeline.min_window_bytes, services.pipeline.energy_gate_rms),
                    session.language.language(),
                    session.sample_rate,
                );
                let (handle, events) = WorkerHandle::spawn(worker, EVENT_CAPACITY);
                (Some(handle), Some(events))
            }
            None => (None, None),
        };

        Self {
            segmenter: Segmenter::new(min_bytes, max_bytes),
            audio: PcmAudio::empty(session.sample_rate),
            max_bytes: session.bytes_for_ms(services.pipeline.max_utterance_ms),
            worker,
            events,
            last_partial: None,
            detected_language: None,
        }
    }

    /// Append audio; returns true once the utterance is at its maximum length
    fn push(&mut self, bytes: &[u8]) -> bool {
        self.audio.extend_from_slice(bytes);
        if let Some(window) = self.segmenter.push(bytes) {
            if let Some(worker) = &self.worker {
                let superseded = matches!(worker.submit(window), SlotSend::Replaced(_));
                metrics::record_window_enqueued(superseded);
            }
        }
        self.audio.len_bytes() >= self.max_bytes
    }
}

enum Step {
    Frame(Option<Result<Inbound, TransportError>>),
    Event(Option<WorkerEvent>),
    Idle,
}

async fn next_event(events: &mut Option<mpsc::Receiver<WorkerEvent>>) -> Option<WorkerEvent> {
    match events {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

/// State machine for one connection
pub struct ConnectionLifecycle<T: MessageTransport> {
    transport: T,
    services: Arc<ConnectionServices>,
    entry: Option<Arc<ConnectionEntry>>,
    state: ConnectionState,
    states: Vec<ConnectionState>,
    outbound_alive: bool,
    partials_sent: usize,
}

impl<T: MessageTransport> ConnectionLifecycle<T> {
    pub fn new(transport: T, services: Arc<ConnectionServices>) -> Self {
        Self {
            transport,
            services,
            entry: None,
            state: ConnectionState::Handshaking,
            states: vec![ConnectionState::Handshaking],
            outbound_alive: true,
            partials_sent: 0,
        }
    }

    /// Mirror state changes into a registry entry
    pub fn with_entry(mut self, entry: Arc<ConnectionEntry>) -> Self {
        entry.set_state(self.state);
        self.entry = Some(entry);
        self
    }

    /// Run the connection to completion
    pub async fn run(mut self) -> ConnectionOutcome {
        let session = match self.handshake().await {
            Ok(session) => session,
            Err(reason) => return self.finish(None, reason, None, None).await,
        };

        let session_id = session.session_id.clone();
        let mut utterance = Utterance::new(&session, &self.services);

        self.transition(ConnectionState::Streaming);
        let reason = self.stream(&session, &mut utterance).await;

        if !reason.finalizes() {
            return self.finish(Some(session_id), reason, None, None).await;
        }

        self.transition(ConnectionState::Closing);
        let stats = self.close_input(&session, &mut utterance).await;

        self.transition(ConnectionState::Finalizing);
        let result = self.finalize(&session, utterance).await;

        self.finish(Some(session_id), reason, Some(result), stats).await
    }

    async fn handshake(&mut self) -> Result<SessionConfig, EndReason> {
        let deadline = Instant::now() + self.services.handshake_timeout;

        loop {
            let received = tokio::time::timeout_at(deadline, self.transport.recv()).await;
            let frame = match received {
                Err(_) => return Err(EndReason::HandshakeTimeout),
                Ok(None) => return Err(EndReason::Disconnected),
                Ok(Some(Err(e))) if e.is_protocol_violation() => {
                    return Err(self.violation(e.to_string()).await)
                }
                Ok(Some(Err(e))) => {
                    tracing::debug!(error = %e, "Transport error during handshake");
                    return Err(EndReason::Disconnected);
                }
                Ok(Some(Ok(frame))) => frame,
            };

            let text = match frame {
                Inbound::Binary(bytes) => {
                    tracing::warn!(bytes = bytes.len(), "Audio before hello, dropped");
                    continue;
                }
                Inbound::Text(text) => text,
            };

            let hello = match ClientMessage::parse(&text) {
                Ok(ClientMessage::Hello(hello)) => hello,
                Ok(ClientMessage::End) => return Err(EndReason::EndBeforeHello),
                Err(e) => return Err(self.violation(e.to_string()).await),
            };

            let session = match session_from_hello(hello, &self.services.pipeline) {
                Ok(session) => session,
                Err(message) => return Err(self.violation(message).await),
            };

            if let Some(entry) = &self.entry {
                entry.set_session(session.session_id.clone());
            }
            let ack = ServerMessage::Ack {
                session_id: session.session_id.clone(),
            };
            if !self.send(&ack).await {
                return Err(EndReason::SendFailed);
            }

            tracing::info!(
                session_id = %session.session_id,
                user_id = %session.user_id,
                rate = session.sample_rate,
                lang = %session.language,
                "Session started"
            );
            return Ok(session);
        }
    }

    async fn stream(&mut self, session: &SessionConfig, utterance: &mut Utterance) -> EndReason {
        let idle = session.idle_finalize;
        let mut idle_deadline = Instant::now() + idle;
        let mut limiter = RateLimiter::new(&self.services.rate_limit, session.bytes_per_second());

        loop {
            let step = tokio::select! {
                biased;
                event = next_event(&mut utterance.events) => Step::Event(event),
                frame = self.transport.recv() => Step::Frame(frame),
                _ = sleep_until(idle_deadline) => Step::Idle,
            };

            match step {
                Step::Idle => {
                    tracing::debug!(session_id = %session.session_id, idle_ms = idle.as_millis() as u64, "Idle deadline reached");
                    return EndReason::IdleTimeout;
                }
                Step::Event(Some(event)) => {
                    if !self.on_event(session, utterance, event).await {
                        return EndReason::SendFailed;
                    }
                }
                Step::Event(None) => {
                    utterance.events = None;
                }
                Step::Frame(None) => return EndReason::Disconnected,
                Step::Frame(Some(Err(e))) if e.is_protocol_violation() => {
                    return self.violation(e.to_string()).await;
                }
                Step::Frame(Some(Err(e))) => {
                    tracing::debug!(session_id = %session.session_id, error = %e, "Transport error");
                    return EndReason::Disconnected;
                }
                Step::Frame(Some(Ok(Inbound::Binary(bytes)))) => {
                    idle_deadline = Instant::now() + idle;
                    if let Err(e) = limiter.check_frame(bytes.len()) {
                        tracing::warn!(session_id = %session.session_id, bytes = bytes.len(), error = %e, "Audio frame dropped");
                        continue;
                    }
                    if utterance.push(&bytes) {
                        tracing::info!(session_id = %session.session_id, bytes = utterance.audio.len_bytes(), "Maximum utterance length reached");
                        return EndReason::MaxDuration;
                    }
                }
                Step::Frame(Some(Ok(Inbound::Text(text)))) => {
                    idle_deadline = Instant::now() + idle;
                    match ClientMessage::parse(&text) {
                        Ok(ClientMessage::End) => return EndReason::EndMessage,
                        Ok(ClientMessage::Hello(_)) => {
                            tracing::debug!(session_id = %session.session_id, "Duplicate hello ignored");
                        }
                        Err(e) => return self.violation(e.to_string()).await,
                    }
                }
            }
        }
    }

    /// Flush the buffer, stop the worker and let an in-flight partial land
    async fn close_input(&mut self, session: &SessionConfig, utterance: &mut Utterance) -> Option<WorkerStats> {
        let remainder = utterance.segmenter.flush().map(|r| r.len()).unwrap_or(0);
        tracing::debug!(
            session_id = %session.session_id,
            remainder,
            total_bytes = utterance.audio.len_bytes(),
            "Input closed"
        );

        let worker = utterance.worker.take()?;
        worker.close();

        let deadline = Instant::now() + self.services.pipeline.drain_grace();
        if let Some(mut events) = utterance.events.take() {
            let drain = async {
                while let Some(event) = events.recv().await {
                    self.on_event(session, utterance, event).await;
                }
            };
            if tokio::time::timeout_at(deadline, drain).await.is_err() {
                tracing::debug!(session_id = %session.session_id, "Drain grace elapsed, cancelling worker");
            }
        }

        let stats = worker.finish(deadline.saturating_duration_since(Instant::now())).await;
        if let Some(stats) = &stats {
            metrics::record_worker_stats(stats);
        }
        stats
    }

    async fn finalize(&mut self, session: &SessionConfig, utterance: Utterance) -> FinalizationResult {
        let input = FinalizationInput {
            session_id: session.session_id.clone(),
            audio: utterance.audio,
            last_partial: utterance.last_partial,
            hint: session.language,
            detected_language: utterance.detected_language,
        };
        let result = self.services.arbiter.finalize(input).await;
        metrics::record_finalization(&result);

        let Some(candidate) = &result.candidate else {
            tracing::info!(session_id = %session.session_id, attempts = result.attempts.len(), "Utterance abandoned");
            return result;
        };

        tracing::info!(
            session_id = %session.session_id,
            source = candidate.provenance().as_str(),
            lang = %result.language,
            elapsed_ms = result.elapsed.as_millis() as u64,
            "Final transcript"
        );

        self.send(&ServerMessage::final_transcript(candidate, result.language.as_str()))
            .await;

        let handoff = UtteranceHandoff::new(session, candidate, result.language);
        match self.services.dialogue.handle(&handoff).await {
            Ok(Some(reply)) => {
                self.send(&ServerMessage::reply(reply)).await;
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(session_id = %session.session_id, error = %e, "Dialogue hand-off failed"),
        }

        if let Some(writer) = &self.services.writer {
            if let Err(e) = writer.submit(TranscriptRecord::new(session, candidate, result.language)) {
                tracing::warn!(session_id = %session.session_id, error = %e, "Transcript record not queued");
            }
        }

        result
    }

    /// Publish a partial; false when the peer can no longer be reached
    async fn on_event(&mut self, session: &SessionConfig, utterance: &mut Utterance, event: WorkerEvent) -> bool {
        let WorkerEvent::Partial {
            text,
            language,
            elapsed,
            ..
        } = event;

        if language.is_some() {
            utterance.detected_language = language;
        }
        tracing::debug!(session_id = %session.session_id, elapsed_ms = elapsed.as_millis() as u64, "Partial");
        if let Some(backend) = &self.services.backends.local {
            metrics::record_partial(backend.name(), elapsed);
        }

        let sent = self.send(&ServerMessage::partial(text.clone())).await;
        if sent {
            self.partials_sent += 1;
        }
        utterance.last_partial = Some(text);
        sent
    }

    /// Send unless the outbound side is already dead; a failure marks it dead
    async fn send(&mut self, message: &ServerMessage) -> bool {
        if !self.outbound_alive {
            return false;
        }
        match self.transport.send(message).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(kind = message.kind(), error = %e, "Send failed, outbound closed");
                self.outbound_alive = false;
                false
            }
        }
    }

    async fn violation(&mut self, message: String) -> EndReason {
        tracing::warn!(error = %message, "Protocol violation");
        self.send(&ServerMessage::error(message.clone())).await;
        EndReason::ProtocolViolation(message)
    }

    fn transition(&mut self, next: ConnectionState) {
        if !self.state.can_transition_to(next) {
            tracing::debug!(from = %self.state, to = %next, "Ignored backward transition");
            return;
        }
        self.state = next;
        self.states.push(next);
        if let Some(entry) = &self.entry {
            entry.set_state(next);
        }
    }

    async fn finish(
        mut self,
        session_id: Option<String>,
        end_reason: EndReason,
        finalization: Option<FinalizationResult>,
        worker_stats: Option<WorkerStats>,
    ) -> ConnectionOutcome {
        self.transition(ConnectionState::Done);
        self.transport.close().await;
        metrics::record_connection_closed(end_reason.as_str());

        tracing::info!(
            session_id = session_id.as_deref().unwrap_or("-"),
            reason = end_reason.as_str(),
            partials = self.partials_sent,
            "Connection closed"
        );

        ConnectionOutcome {
            session_id,
            end_reason,
            states: self.states,
            finalization,
            partials_sent: self.partials_sent,
            worker_stats,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use voice_order_core::Language;

    #[test]
    fn test_session_from_minimal_hello() {
        let pipeline = PipelineConfig::default();
        let session = session_from_hello(Hello::default(), &pipeline).unwrap();

        assert_eq!(session.user_id, "guest");
        assert_eq!(session.sample_rate, 16_000);
        assert_eq!(session.language, LanguagePreference::Auto);
        assert_eq!(session.idle_finalize, Duration::from_millis(1200));
        assert!(!session.session_id.is_empty());
    }

    #[test]
    fn test_session_from_full_hello() {
        let hello = Hello {
            session_id: Some("abc".to_string()),
            user_id: Some("u1".to_string()),
            rate: Some(8000),
            channels: Some(1),
            lang: Some("bn".to_string()),
            tenant: Some("cafe".to_string()),
            branch: Some(" ".to_string()),
            channel: None,
        };
        let session = session_from_hello(hello, &PipelineConfig::default()).unwrap();

        assert_eq!(session.session_id, "abc");
        assert_eq!(session.sample_rate, 8000);
        assert_eq!(session.language, LanguagePreference::Explicit(Language::Bengali));
        assert_eq!(session.tenant.as_deref(), Some("cafe"));
        assert!(session.branch.is_none());
    }

    #[test]
    fn test_hello_validation() {
        let pipeline = PipelineConfig::default();
        let stereo = Hello {
            channels: Some(2),
            ..Hello::default()
        };
        assert!(session_from_hello(stereo, &pipeline).is_err());

        let too_fast = Hello {
            rate: Some(96_000),
            ..Hello::default()
        };
        assert!(session_from_hello(too_fast, &pipeline).is_err());
    }

    #[test]
    fn test_unknown_language_uses_default() {
        let pipeline = PipelineConfig {
            default_language: "en".to_string(),
            ..PipelineConfig::default()
        };
        let hello = Hello {
            lang: Some("klingon".to_string()),
            ..Hello::default()
        };
        let session = session_from_hello(hello, &pipeline).unwrap();
        assert_eq!(session.language, LanguagePreference::Explicit(Language::English));

        let session = session_from_hello(Hello::default(), &pipeline).unwrap();
        assert_eq!(session.language, LanguagePreference::Explicit(Language::English));
    }

    #[test]
    fn test_end_reason_finalizes() {
        assert!(EndReason::IdleTimeout.finalizes());
        assert!(EndReason::Disconnected.finalizes());
        assert!(EndReason::SendFailed.finalizes());
        assert!(!EndReason::HandshakeTimeout.finalizes());
        assert!(!EndReason::ProtocolViolation("x".into()).finalizes());
    }
}
