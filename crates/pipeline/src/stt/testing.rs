//! Scripted in-memory backend for tests

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use voice_order_core::{Language, PcmAudio, Transcription, TranscriptionError};

use super::SttBackend;

/// One recorded `transcribe` call
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub bytes: usize,
    pub language: Option<Language>,
}

#[derive(Debug, Clone)]
struct Step {
    delay: Duration,
    result: Result<Transcription, TranscriptionError>,
}

/// Backend that replays queued results in call order
///
/// When the queue runs dry the fallback result is returned (an empty
/// transcription unless set with [`ScriptedBackend::otherwise`]).
#[derive(Debug)]
pub struct ScriptedBackend {
    name: String,
    steps: Mutex<VecDeque<Step>>,
    fallback: Mutex<Step>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedBackend {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(Step {
                delay: Duration::ZERO,
                result: Ok(Transcription::default()),
            }),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Queue a plain text result
    pub fn then_text(self, text: &str) -> Self {
        self.then(Ok(Transcription::new(text)))
    }

    /// Queue a result with a detected language
    pub fn then_text_in(self, text: &str, language: Language) -> Self {
        self.then(Ok(Transcription::new(text).with_language(language)))
    }

    /// Queue an arbitrary result
    pub fn then(self, result: Result<Transcription, TranscriptionError>) -> Self {
        self.then_after(Duration::ZERO, result)
    }

    /// Queue a result delivered after `delay`
    pub fn then_after(
        self,
        delay: Duration,
        result: Result<Transcription, TranscriptionError>,
    ) -> Self {
        self.steps.lock().push_back(Step { delay, result });
        self
    }

    /// Result for calls beyond the queue
    pub fn otherwise(self, delay: Duration, result: Result<Transcription, TranscriptionError>) -> Self {
        *self.fallback.lock() = Step { delay, result };
        self
    }

    /// Calls made so far
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl SttBackend for ScriptedBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn transcribe(
        &self,
        audio: &PcmAudio,
        language: Option<Language>,
    ) -> Result<Transcription, TranscriptionError> {
        self.calls.lock().push(RecordedCall {
            bytes: audio.len_bytes(),
            language,
        });

        let step = self
            .steps
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.fallback.lock().clone());

        if !step.delay.is_zero() {
            tokio::time::sleep(step.delay).await;
        }
        step.result
    }
}
