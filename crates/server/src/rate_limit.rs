//! Per-connection inbound rate limiting
//!
//! Two token buckets over audio frames: one counting frames, one counting
//! bytes. The byte budget scales with the session's real-time rate.
//! Control messages are never limited. A frame that does not fit is
//! dropped; the connection stays open.

use tokio::time::Instant;
use voice_order_config::RateLimitConfig;

/// Refilling token bucket
#[derive(Debug, Clone)]
struct Bucket {
    tokens: f64,
    capacity: f64,
    per_second: f64,
}

impl Bucket {
    fn new(per_second: f64, burst_multiplier: f32) -> Self {
        let capacity = per_second * burst_multiplier.max(1.0) as f64;
        Self {
            tokens: capacity,
            capacity,
            per_second,
        }
    }

    fn refill(&mut self, elapsed_secs: f64) {
        self.tokens = (self.tokens + elapsed_secs * self.per_second).min(self.capacity);
    }

    fn has(&self, amount: f64) -> bool {
        self.tokens >= amount
    }

    fn take(&mut self, amount: f64) {
        self.tokens -= amount;
    }
}

/// Token bucket limiter for one connection
#[derive(Debug)]
pub struct RateLimiter {
    enabled: bool,
    frames: Bucket,
    audio: Bucket,
    last_refill: Instant,
}

impl RateLimiter {
    /// Limiter for a session streaming `realtime_bytes_per_second`
    ///
    /// The audio budget is the larger of the configured floor and the
    /// real-time rate times `realtime_headroom`.
    pub fn new(config: &RateLimitConfig, realtime_bytes_per_second: usize) -> Self {
        let realtime = realtime_bytes_per_second as f64 * config.realtime_headroom.max(1.0) as f64;
        let audio_per_second = realtime.max(config.audio_bytes_per_second as f64);
        Self {
            enabled: config.enabled,
            frames: Bucket::new(config.messages_per_second as f64, config.burst_multiplier),
            audio: Bucket::new(audio_per_second, config.burst_multiplier),
            last_refill: Instant::now(),
        }
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        if elapsed > 0.0 {
            self.frames.refill(elapsed);
            self.audio.refill(elapsed);
            self.last_refill = now;
        }
    }

    /// Admit a frame carrying `audio_bytes` of PCM
    ///
    /// Nothing is consumed when the frame is rejected.
    pub fn check_frame(&mut self, audio_bytes: usize) -> Result<(), RateLimitError> {
        if !self.enabled {
            return Ok(());
        }
        self.refill();

        if !self.frames.has(1.0) {
            return Err(RateLimitError::FrameRateExceeded);
        }
        let bytes = audio_bytes as f64;
        if !self.audio.has(bytes) {
            return Err(RateLimitError::AudioRateExceeded);
        }

        self.frames.take(1.0);
        self.audio.take(bytes);
        Ok(())
    }
}

/// Rate limit errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RateLimitError {
    #[error("Frame rate limit exceeded")]
    FrameRateExceeded,
    #[error("Audio rate limit exceeded")]
    AudioRateExceeded,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn config(messages_per_second: u32, audio_bytes_per_second: u32, burst_multiplier: f32) -> RateLimitConfig {
        RateLimitConfig {
            enabled: true,
            messages_per_second,
            audio_bytes_per_second,
            realtime_headroom: 1.0,
            burst_multiplier,
        }
    }

    #[test]
    fn test_burst_allowance() {
        let mut limiter = RateLimiter::new(&config(10, 1000, 2.0), 0);

        for _ in 0..20 {
            assert!(limiter.check_frame(0).is_ok());
        }
        assert_eq!(limiter.check_frame(0), Err(RateLimitError::FrameRateExceeded));
    }

    #[test]
    fn test_audio_bytes_limited() {
        let mut limiter = RateLimiter::new(&config(100, 1000, 1.0), 0);

        assert!(limiter.check_frame(600).is_ok());
        assert_eq!(limiter.check_frame(600), Err(RateLimitError::AudioRateExceeded));
        // The rejected frame consumed nothing
        assert!(limiter.check_frame(400).is_ok());
    }

    #[test]
    fn test_audio_budget_follows_session_rate() {
        let config = RateLimitConfig::default();
        // 48kHz mono: 96000 B/s, with the default headroom and burst
        let mut limiter = RateLimiter::new(&config, 96_000);
        assert!(limiter.check_frame(300_000).is_ok());

        // The configured floor still applies to slow sessions
        let mut limiter = RateLimiter::new(&config, 16_000);
        assert!(limiter.check_frame(128_000).is_ok());
        assert!(limiter.check_frame(1000).is_err());
    }

    #[test]
    fn test_disabled_allows_everything() {
        let mut limiter = RateLimiter::new(
            &RateLimitConfig {
                enabled: false,
                ..config(1, 1, 1.0)
            },
            0,
        );

        for _ in 0..1000 {
            assert!(limiter.check_frame(32_000).is_ok());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokens_refill_over_time() {
        let mut limiter = RateLimiter::new(&config(10, 1000, 1.0), 0);
        assert!(limiter.check_frame(1000).is_ok());
        assert!(limiter.check_frame(500).is_err());

        tokio::time::advance(Duration::from_millis(500)).await;
        assert!(limiter.check_frame(500).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_realtime_48k_stream_never_limited() {
        let mut limiter = RateLimiter::new(&RateLimitConfig::default(), 96_000);

        // 20 ms frames for ten seconds
        for _ in 0..500 {
            assert!(limiter.check_frame(1920).is_ok());
            tokio::time::advance(Duration::from_millis(20)).await;
        }
    }
}
