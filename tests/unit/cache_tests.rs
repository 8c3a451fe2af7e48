/*!
 * Tests for translation cache behavior seen through the translation service
 */

use futures::future::join_all;
use lingofix::database::{CacheRepository, DatabaseConnection};
use lingofix::errors::TranslateError;
use lingofix::extraction::TranslationOutcome;
use lingofix::providers::{MockBehavior, MockTranslator};
use lingofix::translation::{CancellationFlag, TranslationCache};

use crate::common::{build_service, create_temp_dir, zh_dictionary};

fn persisted_cache(path: &std::path::Path) -> TranslationCache {
    let connection = DatabaseConnection::new(path).unwrap();
    TranslationCache::with_store(CacheRepository::new(connection))
}

#[tokio::test]
async fn test_cache_persisted_shouldServeNewProcessWithoutTranslator() {
    let dir = create_temp_dir().unwrap();
    let db_path = dir.path().join("nested/cache.db");

    let first = zh_dictionary();
    let service = build_service(first.clone(), persisted_cache(&db_path), CancellationFlag::new());
    assert_eq!(
        service.resolve("计算总价").await,
        TranslationOutcome::Translated("Calculate total price".into())
    );
    assert_eq!(first.call_count(), 1);

    // A fresh cache over the same database file stands in for a new run
    let second = MockTranslator::failing(TranslateError::Unknown("must not be called".into()));
    let service = build_service(second.clone(), persisted_cache(&db_path), CancellationFlag::new());
    assert_eq!(
        service.resolve("计算总价  ").await,
        TranslationOutcome::CacheHit("Calculate total price".into())
    );
    assert_eq!(second.call_count(), 0);
}

#[test]
fn test_cache_languagePair_shouldBePartOfKey() {
    let cache = TranslationCache::new(true);

    tokio_test::block_on(async {
        cache.put("你好", "zh", "en", "Hello").await;

        assert_eq!(cache.get("你好", "zh", "en").await, Some("Hello".to_string()));
        assert_eq!(cache.get("你好", "zh", "de").await, None);
        assert_eq!(cache.get("你好", "ja", "en").await, None);
        // Leading whitespace is significant, trailing is not
        assert_eq!(cache.get("你好 \n", "zh", "en").await, Some("Hello".to_string()));
        assert_eq!(cache.get(" 你好", "zh", "en").await, None);
    });

    let stats = cache.stats();
    assert_eq!(stats.hits, 2);
    assert_eq!(stats.misses, 3);
}

#[tokio::test]
async fn test_cache_concurrentResolves_shouldShareOneCall() {
    let translator = MockTranslator::slow(40, MockBehavior::Prefix("EN: ".into()));
    let service = build_service(translator.clone(), TranslationCache::new(true), CancellationFlag::new());

    let outcomes = join_all((0..8).map(|_| service.resolve("加载数据"))).await;

    assert_eq!(translator.call_count(), 1);
    let translated = outcomes
        .iter()
        .filter(|o| matches!(o, TranslationOutcome::Translated(_)))
        .count();
    assert_eq!(translated, 1);
    assert!(outcomes.iter().all(|o| o.replacement() == Some("EN: 加载数据")));

    let stats = service.cache().stats();
    assert_eq!(stats.translator_calls, 1);
    assert_eq!(stats.entries, 1);
    assert_eq!(stats.hits, 7);
}

#[tokio::test]
async fn test_cache_disabled_shouldCallEveryTime() {
    let translator = zh_dictionary();
    let service = build_service(translator.clone(), TranslationCache::new(false), CancellationFlag::new());

    for _ in 0..3 {
        assert_eq!(
            service.resolve("返回结果").await,
            TranslationOutcome::Translated("Return the result".into())
        );
    }
    assert_eq!(translator.call_count(), 3);
    assert!(service.cache().is_empty());
}

#[tokio::test]
async fn test_cache_clear_shouldForceNewCall() {
    let dir = create_temp_dir().unwrap();
    let cache = persisted_cache(&dir.path().join("cache.db"));
    let translator = zh_dictionary();
    let service = build_service(translator.clone(), cache.clone(), CancellationFlag::new());

    service.resolve("计算总价").await;
    cache.clear().await.unwrap();
    assert!(cache.is_empty());

    let reopened = persisted_cache(&dir.path().join("cache.db"));
    let again = build_service(translator.clone(), reopened, CancellationFlag::new());
    assert!(matches!(again.resolve("计算总价").await, TranslationOutcome::Translated(_)));
    assert_eq!(translator.call_count(), 2);
}
