/*!
 * Core translation service implementation.
 *
 * `TranslationService` resolves one unit's text to a terminal outcome. Each
 * lookup goes through the cache (with per-key single-flight); a miss runs the
 * translator under the rate limiter, a per-call timeout and the retry policy.
 * Cancellation stops new calls from starting.
 */

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use log::{debug, warn};

use crate::app_config::Config;
use crate::errors::TranslateError;
use crate::extraction::{SkipReason, TranslationOutcome};
use crate::providers::Translator;

use super::cache::{CacheResolution, TranslationCache};
use super::concurrency::{CancellationFlag, RateLimiter};
use super::retry::RetryPolicy;

/// Translation service shared by every worker of a run
#[derive(Clone)]
pub struct TranslationService {
    translator: Arc<dyn Translator>,
    cache: TranslationCache,
    retry: RetryPolicy,
    limiter: RateLimiter,
    call_timeout: Duration,
    cancel: CancellationFlag,
    source_language: String,
    target_language: String,
}

impl TranslationService {
    /// Create a service with default retry, no throttling and a 30 s call timeout
    pub fn new(
        translator: Arc<dyn Translator>,
        cache: TranslationCache,
        source_language: impl Into<String>,
        target_language: impl Into<String>,
    ) -> Self {
        Self {
            translator,
            cache,
            retry: RetryPolicy::default(),
            limiter: RateLimiter::unlimited(),
            call_timeout: Duration::from_secs(30),
            cancel: CancellationFlag::new(),
            source_language: source_language.into(),
            target_language: target_language.into(),
        }
    }

    /// Create a service from the configuration
    pub fn from_config(
        config: &Config,
        translator: Arc<dyn Translator>,
        cache: TranslationCache,
        cancel: CancellationFlag,
    ) -> Self {
        Self::new(translator, cache, &config.source_language, &config.target_language)
            .with_retry(RetryPolicy::from_config(&config.translation))
            .with_rate_limiter(RateLimiter::new(config.translation.rate_limit))
            .with_call_timeout(Duration::from_secs(config.translation.timeout_secs))
            .with_cancellation(cancel)
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_rate_limiter(mut self, limiter: RateLimiter) -> Self {
        self.limiter = limiter;
        self
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cache(&self) -> &TranslationCache {
        &self.cache
    }

    pub fn translator(&self) -> &Arc<dyn Translator> {
        &self.translator
    }

    pub fn cancellation(&self) -> &CancellationFlag {
        &self.cancel
    }

    pub fn source_language(&self) -> &str {
        &self.source_language
    }

    pub fn target_language(&self) -> &str {
        &self.target_language
    }

    /// Resolve `text` to a terminal outcome. Never fails: errors become `Failed`.
    pub async fn resolve(&self, text: &str) -> TranslationOutcome {
        let source = self.source_language.as_str();
        let target = self.target_language.as_str();

        if self.cancel.is_cancelled() {
            return match self.cache.get(text, source, target).await {
                Some(hit) => TranslationOutcome::CacheHit(hit),
                None => TranslationOutcome::Skipped(SkipReason::Cancelled),
            };
        }

        let called = AtomicBool::new(false);
        let resolution = self
            .cache
            .resolve_with(text, source, target, || self.call_with_retry(text, &called))
            .await;

        match resolution {
            Ok(CacheResolution::Hit(translated)) => TranslationOutcome::CacheHit(translated),
            Ok(CacheResolution::Translated(translated)) => TranslationOutcome::Translated(translated),
            Err(_) if self.cancel.is_cancelled() && !called.load(Ordering::SeqCst) => {
                TranslationOutcome::Skipped(SkipReason::Cancelled)
            }
            Err(e) => {
                warn!("Translation failed, keeping original text: {}", e);
                TranslationOutcome::Failed(e)
            }
        }
    }

    async fn call_with_retry(&self, text: &str, called: &AtomicBool) -> Result<String, TranslateError> {
        self.retry
            .run(&self.cancel, |attempt| self.attempt(text, attempt, called))
            .await
    }

    async fn attempt(&self, text: &str, attempt: u32, called: &AtomicBool) -> Result<String, TranslateError> {
        self.limiter.acquire().await;
        if self.cancel.is_cancelled() {
            return Err(TranslateError::Unavailable("run cancelled".into()));
        }

        called.store(true, Ordering::SeqCst);
        debug!("Translator call (attempt {}) via {}", attempt + 1, self.translator.name());

        let call = self
            .translator
            .translate(text, &self.source_language, &self.target_language);
        let translated = match tokio::time::timeout(self.call_timeout, call).await {
            Ok(result) => result?,
            Err(_) => return Err(TranslateError::Timeout(self.call_timeout.as_millis() as u64)),
        };

        if translated.trim().is_empty() {
            return Err(TranslateError::Unknown("translator returned empty text".into()));
        }
        Ok(translated)
    }
}
