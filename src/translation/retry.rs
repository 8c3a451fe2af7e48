/*!
 * Retry policy for translator calls.
 *
 * Only transient failures (`Timeout`, `RateLimited`, `Unavailable`) are
 * retried, with exponential backoff capped at `max_backoff` and random jitter.
 */

use std::future::Future;
use std::time::Duration;

use log::warn;
use rand::Rng;

use crate::app_config::TranslationConfig;
use crate::errors::TranslateError;
use crate::translation::concurrency::CancellationFlag;

/// Bounded exponential backoff
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
    /// Shave up to a quarter off each delay so workers do not retry in lockstep
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_backoff: Duration::from_millis(1000),
            max_backoff: Duration::from_secs(30),
            jitter: true,
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &TranslationConfig) -> Self {
        Self {
            max_retries: config.retry_count,
            base_backoff: Duration::from_millis(config.retry_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms.max(config.retry_backoff_ms)),
            jitter: true,
        }
    }

    /// A policy that never retries
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Delay before retry number `attempt` (1-based): `base * 2^(attempt-1)`, capped
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(20);
        let delay = self
            .base_backoff
            .saturating_mul(1u32 << exponent)
            .min(self.max_backoff);

        if self.jitter && !delay.is_zero() {
            let spread = delay.as_millis() as u64 / 4;
            let shave = rand::rng().random_range(0..=spread);
            delay - Duration::from_millis(shave)
        } else {
            delay
        }
    }

    /// Run `operation` until it succeeds, fails permanently, exhausts the
    /// retries, or the run is cancelled. `operation` receives the 0-based attempt.
    pub async fn run<F, Fut, T>(
        &self,
        cancel: &CancellationFlag,
        mut operation: F,
    ) -> Result<T, TranslateError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, TranslateError>>,
    {
        let mut attempt = 0;
        loop {
            match operation(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < self.max_retries && !cancel.is_cancelled() => {
                    attempt += 1;
                    let delay = self.backoff_for(attempt);
                    warn!(
                        "Translator call failed ({}), retry {}/{} in {} ms",
                        e,
                        attempt,
                        self.max_retries,
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
