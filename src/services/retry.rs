//! Bounded retry with exponential backoff.
//!
//! The sleep is injected so retry behavior is deterministically testable
//! without real delays.

use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;

use crate::error::Result;

/// Retry configuration for exponential backoff.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts after the first try
    pub max_retries: u32,
    /// Initial delay in milliseconds before the first retry
    pub initial_delay_ms: u64,
    /// Maximum delay between retries in milliseconds
    pub max_delay_ms: u64,
    /// Multiplier applied to the delay after each retry
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 250,
            max_delay_ms: 30_000,
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Rollback retry knobs from application config.
    pub fn rollback(config: &crate::config::Config) -> Self {
        Self {
            max_retries: config.rollback_max_retries,
            initial_delay_ms: config.rollback_initial_delay_ms,
            max_delay_ms: config.rollback_max_delay_ms,
            backoff_multiplier: 2.0,
        }
    }

    /// Delay before retry number `retry` (1-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = self.backoff_multiplier.powi(retry.saturating_sub(1) as i32);
        let ms = (self.initial_delay_ms as f64 * factor).min(self.max_delay_ms as f64);
        Duration::from_millis(ms as u64)
    }
}

/// Injected sleep.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Production sleeper backed by the tokio timer.
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// No-op sleeper recording requested delays, for tests.
pub struct NoopSleeper {
    pub delays: tokio::sync::Mutex<Vec<Duration>>,
}

impl NoopSleeper {
    pub fn new() -> Self {
        Self {
            delays: tokio::sync::Mutex::new(Vec::new()),
        }
    }
}

impl Default for NoopSleeper {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Sleeper for NoopSleeper {
    async fn sleep(&self, duration: Duration) {
        self.delays.lock().await.push(duration);
    }
}

/// Run `operation`, retrying transient failures up to `config.max_retries`
/// times with exponential backoff. Non-transient errors propagate
/// immediately.
pub async fn with_retry<T, F, Fut>(
    config: &RetryConfig,
    sleeper: &dyn Sleeper,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut + Send,
    Fut: Future<Output = Result<T>> + Send,
{
    let mut retry = 0u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && retry < config.max_retries => {
                retry += 1;
                let delay = config.delay_for(retry);
                tracing::warn!(
                    error = %e,
                    retry,
                    max_retries = config.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    "transient failure, retrying"
                );
                sleeper.sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}
