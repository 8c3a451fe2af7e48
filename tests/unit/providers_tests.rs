/*!
 * Tests for translator backends against a local HTTP stub
 */

use std::sync::Arc;
use std::time::Duration;

use lingofix::app_config::{Config, TranslationProvider};
use lingofix::errors::TranslateError;
use lingofix::extraction::TranslationOutcome;
use lingofix::providers::{create_translator, OllamaTranslator, Translator};
use lingofix::translation::{CancellationFlag, TranslationCache, TranslationService};

use crate::common::fast_retry;
use crate::common::http_stub::HttpStub;

const OK_BODY: &str = r#"{"model":"llama3","response":" Hello ","done":true}"#;

fn ollama(stub: &HttpStub) -> OllamaTranslator {
    OllamaTranslator::new(&stub.base_url, "llama3", Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn test_ollama_success_shouldReturnTrimmedResponse() {
    let stub = HttpStub::start(vec![(200, OK_BODY)]).await;
    let translator = ollama(&stub);

    let translated = translator.translate("你好", "zh", "en").await.unwrap();
    assert_eq!(translated, "Hello");
    assert_eq!(stub.request_count(), 1);
}

#[tokio::test]
async fn test_ollama_streamedBody_shouldBeAssembled() {
    let body = "{\"model\":\"llama3\",\"response\":\"Hel\",\"done\":false}\n{\"model\":\"llama3\",\"response\":\"lo\",\"done\":true}\n";
    let stub = HttpStub::start(vec![(200, body)]).await;

    assert_eq!(ollama(&stub).translate("你好", "zh", "en").await.unwrap(), "Hello");
}

#[tokio::test]
async fn test_ollama_statusCodes_shouldMapToErrorKinds() {
    fn kind(error: &TranslateError) -> &'static str {
        match error {
            TranslateError::RateLimited(_) => "rate-limited",
            TranslateError::Unavailable(_) => "unavailable",
            TranslateError::UnsupportedLanguage { .. } => "unsupported",
            TranslateError::Timeout(_) => "timeout",
            TranslateError::Unknown(_) => "unknown",
        }
    }

    for (status, expected) in [(429, "rate-limited"), (503, "unavailable"), (500, "unavailable"), (400, "unknown")] {
        let stub = HttpStub::start(vec![(status, r#"{"error":"nope"}"#)]).await;
        let err = ollama(&stub).translate("你好", "zh", "en").await.unwrap_err();
        assert_eq!(kind(&err), expected, "status {} mapped to {:?}", status, err);
        assert_eq!(err.is_transient(), status != 400);
    }
}

#[tokio::test]
async fn test_ollama_emptyResponse_shouldFail() {
    let stub = HttpStub::start(vec![(200, r#"{"model":"llama3","response":"   ","done":true}"#)]).await;
    let err = ollama(&stub).translate("你好", "zh", "en").await.unwrap_err();
    assert!(matches!(err, TranslateError::Unknown(_)));
}

#[tokio::test]
async fn test_ollama_unreachable_shouldBeUnavailable() {
    // Bind then drop to get a port nobody listens on
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let address = listener.local_addr().unwrap();
    drop(listener);

    let translator = OllamaTranslator::new(&format!("http://{}", address), "llama3", Duration::from_secs(2)).unwrap();
    let err = translator.translate("你好", "zh", "en").await.unwrap_err();
    assert!(err.is_transient(), "unexpected error {:?}", err);
}

#[tokio::test]
async fn test_service_serverUnavailableOnce_shouldRetryAndSucceed() {
    let stub = HttpStub::start(vec![(503, r#"{"error":"loading model"}"#), (200, OK_BODY)]).await;
    let service = TranslationService::new(Arc::new(ollama(&stub)), TranslationCache::new(true), "zh", "en")
        .with_retry(fast_retry(2))
        .with_cancellation(CancellationFlag::new());

    assert_eq!(service.resolve("你好").await, TranslationOutcome::Translated("Hello".into()));
    assert_eq!(stub.request_count(), 2);
}

#[tokio::test]
async fn test_service_badRequest_shouldNotRetry() {
    let stub = HttpStub::start(vec![(400, r#"{"error":"bad model"}"#), (200, OK_BODY)]).await;
    let service = TranslationService::new(Arc::new(ollama(&stub)), TranslationCache::new(true), "zh", "en")
        .with_retry(fast_retry(3));

    assert!(matches!(
        service.resolve("你好").await,
        TranslationOutcome::Failed(TranslateError::Unknown(_))
    ));
    assert_eq!(stub.request_count(), 1);
}

#[tokio::test]
async fn test_createTranslator_mock_shouldPrefixTargetLanguage() {
    let mut config = Config::default();
    config.translation.provider = TranslationProvider::Mock;
    config.target_language = "de".into();

    let translator = create_translator(&config).unwrap();
    assert_eq!(translator.name(), "mock");
    assert_eq!(translator.translate("你好", "zh", "de").await.unwrap(), "[de] 你好");
}
