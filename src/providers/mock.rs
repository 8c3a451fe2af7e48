/*!
 * Mock translator implementations for testing.
 *
 * This module provides a deterministic translator that simulates different behaviors:
 * - `MockTranslator::prefix()` - Always succeeds by tagging the text
 * - `MockTranslator::dictionary()` - Looks translations up in a fixed table
 * - `MockTranslator::transient_then_succeed()` - Fails transiently, then recovers
 * - `MockTranslator::failing()` - Always fails with the given error
 *
 * Every instance counts its calls; clones share the counter.
 */

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::errors::TranslateError;
use crate::providers::Translator;

/// Behavior mode for the mock translator
#[derive(Debug, Clone, PartialEq)]
pub enum MockBehavior {
    /// Prepend a fixed string
    Prefix(String),
    /// Look the trimmed text up; unknown text is echoed back
    Dictionary(HashMap<String, String>),
    /// Echo the input
    Identity,
    Uppercase,
    /// Fail permanently for text containing `needle`, otherwise behave as `otherwise`
    FailOn {
        needle: String,
        otherwise: Box<MockBehavior>,
    },
    /// Return `Unavailable` for the first `failures` calls
    TransientThenSucceed {
        failures: usize,
        otherwise: Box<MockBehavior>,
    },
    /// Always fail with this error
    Failing(TranslateError),
    /// Sleep before answering (for timeout testing)
    Slow {
        delay_ms: u64,
        otherwise: Box<MockBehavior>,
    },
}

/// Mock translator for testing translation behavior
#[derive(Debug, Clone)]
pub struct MockTranslator {
    behavior: MockBehavior,
    calls: Arc<AtomicUsize>,
}

impl MockTranslator {
    /// Create a new mock translator with the specified behavior
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn prefix(prefix: impl Into<String>) -> Self {
        Self::new(MockBehavior::Prefix(prefix.into()))
    }

    pub fn dictionary<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self::new(MockBehavior::Dictionary(
            entries.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        ))
    }

    pub fn identity() -> Self {
        Self::new(MockBehavior::Identity)
    }

    pub fn uppercase() -> Self {
        Self::new(MockBehavior::Uppercase)
    }

    pub fn fail_on(needle: impl Into<String>, otherwise: MockBehavior) -> Self {
        Self::new(MockBehavior::FailOn {
            needle: needle.into(),
            otherwise: Box::new(otherwise),
        })
    }

    pub fn transient_then_succeed(failures: usize, otherwise: MockBehavior) -> Self {
        Self::new(MockBehavior::TransientThenSucceed {
            failures,
            otherwise: Box::new(otherwise),
        })
    }

    pub fn failing(error: TranslateError) -> Self {
        Self::new(MockBehavior::Failing(error))
    }

    pub fn slow(delay_ms: u64, otherwise: MockBehavior) -> Self {
        Self::new(MockBehavior::Slow {
            delay_ms,
            otherwise: Box::new(otherwise),
        })
    }

    /// Number of `translate` calls so far, across clones
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn behavior(&self) -> &MockBehavior {
        &self.behavior
    }
}

/// Total artificial latency of a behavior chain
fn delay_of(behavior: &MockBehavior) -> u64 {
    match behavior {
        MockBehavior::Slow { delay_ms, otherwise } => delay_ms + delay_of(otherwise),
        MockBehavior::FailOn { otherwise, .. }
        | MockBehavior::TransientThenSucceed { otherwise, .. } => delay_of(otherwise),
        _ => 0,
    }
}

fn respond(behavior: &MockBehavior, text: &str, call_index: usize) -> Result<String, TranslateError> {
    match behavior {
        MockBehavior::Prefix(prefix) => Ok(format!("{}{}", prefix, text)),
        MockBehavior::Dictionary(entries) => Ok(entries
            .get(text.trim())
            .cloned()
            .unwrap_or_else(|| text.to_string())),
        MockBehavior::Identity => Ok(text.to_string()),
        MockBehavior::Uppercase => Ok(text.to_uppercase()),
        MockBehavior::FailOn { needle, otherwise } => {
            if text.contains(needle.as_str()) {
                Err(TranslateError::Unknown(format!("simulated failure for '{}'", needle)))
            } else {
                respond(otherwise, text, call_index)
            }
        }
        MockBehavior::TransientThenSucceed { failures, otherwise } => {
            if call_index < *failures {
                Err(TranslateError::Unavailable(format!(
                    "simulated outage (call #{})",
                    call_index + 1
                )))
            } else {
                respond(otherwise, text, call_index)
            }
        }
        MockBehavior::Failing(error) => Err(error.clone()),
        MockBehavior::Slow { otherwise, .. } => respond(otherwise, text, call_index),
    }
}

#[async_trait]
impl Translator for MockTranslator {
    async fn translate(
        &self,
        text: &str,
        _source_language: &str,
        _target_language: &str,
    ) -> Result<String, TranslateError> {
        let call_index = self.calls.fetch_add(1, Ordering::SeqCst);

        let delay_ms = delay_of(&self.behavior);
        if delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        }

        respond(&self.behavior, text, call_index)
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_prefixTranslator_shouldTagText() {
        let translator = MockTranslator::prefix("EN: ");
        assert_eq!(translator.translate("Hallo", "de", "en").await.unwrap(), "EN: Hallo");
        assert_eq!(translator.call_count(), 1);
    }

    #[tokio::test]
    async fn test_dictionaryTranslator_shouldLookUpTrimmedText() {
        let translator = MockTranslator::dictionary([("计算总价", "Calculate total price")]);
        assert_eq!(
            translator.translate("计算总价 ", "zh", "en").await.unwrap(),
            "Calculate total price"
        );
        assert_eq!(translator.translate("其他", "zh", "en").await.unwrap(), "其他");
    }

    #[tokio::test]
    async fn test_failOn_shouldOnlyFailMatchingText() {
        let translator = MockTranslator::fail_on("坏", MockBehavior::Uppercase);
        assert!(translator.translate("坏的", "zh", "en").await.is_err());
        assert_eq!(translator.translate("ok", "zh", "en").await.unwrap(), "OK");
    }

    #[tokio::test]
    async fn test_transientThenSucceed_shouldRecover() {
        let translator = MockTranslator::transient_then_succeed(2, MockBehavior::Identity);
        let first = translator.translate("x", "de", "en").await;
        assert!(matches!(first, Err(ref e) if e.is_transient()));
        assert!(translator.translate("x", "de", "en").await.is_err());
        assert_eq!(translator.translate("x", "de", "en").await.unwrap(), "x");
    }

    #[tokio::test]
    async fn test_clonedTranslator_shouldShareCallCount() {
        let translator = MockTranslator::transient_then_succeed(1, MockBehavior::Identity);
        let cloned = translator.clone();

        assert!(translator.translate("x", "de", "en").await.is_err());
        assert!(cloned.translate("x", "de", "en").await.is_ok());
        assert_eq!(translator.call_count(), 2);
    }

    #[tokio::test]
    async fn test_slowTranslator_shouldDelay() {
        let translator = MockTranslator::slow(30, MockBehavior::Identity);
        let start = std::time::Instant::now();
        translator.translate("x", "de", "en").await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[tokio::test]
    async fn test_failingTranslator_shouldReturnGivenError() {
        let translator = MockTranslator::failing(TranslateError::RateLimited("quota".into()));
        assert_eq!(
            translator.translate("x", "de", "en").await,
            Err(TranslateError::RateLimited("quota".into()))
        );
    }
}
