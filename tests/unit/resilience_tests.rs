/*!
 * Tests for retry, timeouts and rate limiting around translator calls
 */

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use lingofix::errors::TranslateError;
use lingofix::extraction::TranslationOutcome;
use lingofix::providers::{MockBehavior, MockTranslator};
use lingofix::translation::{RateLimiter, TranslationCache, TranslationService};

use crate::common::fast_retry;

fn service(translator: &MockTranslator, retries: u32) -> TranslationService {
    TranslationService::new(Arc::new(translator.clone()), TranslationCache::new(true), "zh", "en")
        .with_retry(fast_retry(retries))
}

#[tokio::test]
async fn test_retry_unsupportedLanguage_shouldCallOnce() {
    let translator = MockTranslator::failing(TranslateError::UnsupportedLanguage {
        source_language: "zh".into(),
        target_language: "en".into(),
    });

    let outcome = service(&translator, 3).resolve("计算总价").await;

    assert!(matches!(
        outcome,
        TranslationOutcome::Failed(TranslateError::UnsupportedLanguage { .. })
    ));
    assert_eq!(translator.call_count(), 1);
}

#[tokio::test]
async fn test_retry_transientThenSucceed_shouldRecover() {
    let translator = MockTranslator::transient_then_succeed(2, MockBehavior::Prefix("EN: ".into()));

    let outcome = service(&translator, 3).resolve("计算总价").await;

    assert_eq!(outcome, TranslationOutcome::Translated("EN: 计算总价".into()));
    assert_eq!(translator.call_count(), 3);
}

#[tokio::test]
async fn test_retry_rateLimitedExhausted_shouldFailAfterAllAttempts() {
    let translator = MockTranslator::failing(TranslateError::RateLimited("429".into()));
    let service = service(&translator, 2);

    let outcome = service.resolve("计算总价").await;

    assert!(matches!(outcome, TranslationOutcome::Failed(TranslateError::RateLimited(_))));
    assert_eq!(translator.call_count(), 3);
    // Failures are not cached, so the next request tries again
    service.resolve("计算总价").await;
    assert_eq!(translator.call_count(), 6);
}

#[tokio::test]
async fn test_timeout_shouldCountAsTransient() {
    let translator = MockTranslator::slow(100, MockBehavior::Identity);
    let service = service(&translator, 1).with_call_timeout(Duration::from_millis(10));

    let outcome = service.resolve("计算总价").await;

    assert_eq!(outcome, TranslationOutcome::Failed(TranslateError::Timeout(10)));
    assert_eq!(translator.call_count(), 2);
}

#[tokio::test]
async fn test_rateLimiter_shouldSpaceDistinctCalls() {
    let translator = MockTranslator::prefix("EN: ");
    // 600 rpm is one call start every 100 ms
    let service = service(&translator, 0).with_rate_limiter(RateLimiter::new(Some(600)));

    let start = Instant::now();
    let outcomes = join_all(["计算总价", "返回结果", "加载数据"].map(|text| service.resolve(text))).await;

    assert!(outcomes.iter().all(|o| matches!(o, TranslationOutcome::Translated(_))));
    assert_eq!(translator.call_count(), 3);
    assert!(start.elapsed() >= Duration::from_millis(190), "elapsed {:?}", start.elapsed());
}

#[tokio::test]
async fn test_rateLimiter_cacheHits_shouldNotWait() {
    let translator = MockTranslator::prefix("EN: ");
    let service = service(&translator, 0).with_rate_limiter(RateLimiter::new(Some(60)));

    service.resolve("计算总价").await;
    let start = Instant::now();
    for _ in 0..5 {
        assert!(matches!(service.resolve("计算总价").await, TranslationOutcome::CacheHit(_)));
    }
    assert!(start.elapsed() < Duration::from_millis(500));
    assert_eq!(translator.call_count(), 1);
}
