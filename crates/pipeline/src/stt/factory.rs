//! Backend construction from settings

use std::sync::Arc;

use voice_order_config::{BackendConfig, BackendProvider, BackendsConfig};
use voice_order_core::TranscriptionError;

use super::{OpenAiWhisperBackend, SttBackend, WhisperServerBackend};

/// Local and remote backend slots; either may be absent
#[derive(Clone, Default)]
pub struct Backends {
    pub local: Option<Arc<dyn SttBackend>>,
    pub remote: Option<Arc<dyn SttBackend>>,
}

impl std::fmt::Debug for Backends {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backends")
            .field("local", &self.local.as_ref().map(|b| b.name().to_string()))
            .field("remote", &self.remote.as_ref().map(|b| b.name().to_string()))
            .finish()
    }
}

pub struct BackendFactory;

impl BackendFactory {
    /// Build one backend; `None` when the slot is disabled
    pub fn create(
        config: &BackendConfig,
        client: reqwest::Client,
    ) -> Result<Option<Arc<dyn SttBackend>>, TranscriptionError> {
        match config.provider {
            BackendProvider::Disabled => Ok(None),
            BackendProvider::WhisperServer => Ok(Some(Arc::new(WhisperServerBackend::new(
                client,
                config.base_url.clone(),
                config.model.clone(),
                config.api_key.clone(),
            )))),
            BackendProvider::OpenAi => {
                let key = config.api_key.clone().ok_or_else(|| {
                    TranscriptionError::Unavailable(
                        "API key required for OpenAI Whisper".to_string(),
                    )
                })?;
                Ok(Some(Arc::new(OpenAiWhisperBackend::new(
                    client,
                    key,
                    Some(config.base_url.clone()),
                    Some(config.model.clone()),
                ))))
            }
        }
    }

    /// Build both slots; each HTTP client is shared by every connection
    pub fn from_config(config: &BackendsConfig) -> Result<Backends, TranscriptionError> {
        let local = Self::create(&config.local, Self::client(config.local.request_timeout())?)?;
        let remote = Self::create(&config.remote, Self::client(config.remote.request_timeout())?)?;

        tracing::info!(
            local = local.as_ref().map(|b| b.name()).unwrap_or("disabled"),
            remote = remote.as_ref().map(|b| b.name()).unwrap_or("disabled"),
            "Transcription backends configured"
        );

        Ok(Backends { local, remote })
    }

    fn client(timeout: std::time::Duration) -> Result<reqwest::Client, TranscriptionError> {
        reqwest::Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(16)
            .build()
            .map_err(|e| TranscriptionError::Unavailable(format!("http client: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use voice_order_config::BackendsConfig;

    #[test]
    fn test_default_slots() {
        let backends = BackendFactory::from_config(&BackendsConfig::default()).unwrap();
        assert_eq!(backends.local.as_ref().map(|b| b.name()), Some("whisper_server"));
        assert!(backends.remote.is_none());
    }

    #[test]
    fn test_openai_requires_key() {
        let mut config = BackendsConfig::default();
        config.remote.provider = BackendProvider::OpenAi;
        assert!(BackendFactory::from_config(&config).is_err());

        config.remote.api_key = Some("sk-test".to_string());
        let backends = BackendFactory::from_config(&config).unwrap();
        assert_eq!(backends.remote.as_ref().map(|b| b.name()), Some("openai"));
    }
}
