/*!
 * Tests for configuration loading and validation
 */

use lingofix::app_config::{Config, LogLevel, TranslationProvider};
use lingofix::extraction::Priority;

use crate::common::{create_temp_dir, create_test_file};

#[test]
fn test_config_default_shouldValidate() {
    let config = Config::default();
    assert_eq!(config.source_language, "auto");
    assert_eq!(config.target_language, "en");
    assert_eq!(config.translation.provider, TranslationProvider::Ollama);
    assert!(config.cache.enabled && config.cache.persist);
    assert!(config.output.backup);
    assert!(config.validate().is_ok());
}

#[test]
fn test_config_fromFile_partialJson_shouldFillDefaults() {
    let dir = create_temp_dir().unwrap();
    let path = create_test_file(
        dir.path(),
        "conf.json",
        r#"{
            "source_language": "zh-CN",
            "target_language": "de",
            "translation": { "provider": "mock", "rate_limit": 120 },
            "filter": { "min_priority": "high", "skip_patterns": ["^TODO"] },
            "log_level": "debug"
        }"#,
    )
    .unwrap();

    let config = Config::from_file(&path).unwrap();
    assert_eq!(config.source_language, "zh-CN");
    assert_eq!(config.translation.provider, TranslationProvider::Mock);
    assert_eq!(config.translation.rate_limit, Some(120));
    assert_eq!(config.translation.retry_count, 3);
    assert_eq!(config.translation.max_concurrent_units, 8);
    assert_eq!(config.filter.min_priority, Priority::High);
    assert_eq!(config.log_level, LogLevel::Debug);
    assert!(config.validate().is_ok());
}

#[test]
fn test_config_loadOrDefault_missingFile_shouldUseDefaults() {
    let dir = create_temp_dir().unwrap();
    let config = Config::load_or_default(dir.path().join("absent.json")).unwrap();
    assert_eq!(config.target_language, "en");
}

#[test]
fn test_config_fromFile_invalidJson_shouldFail() {
    let dir = create_temp_dir().unwrap();
    let path = create_test_file(dir.path(), "conf.json", "{ not json").unwrap();
    assert!(Config::from_file(&path).is_err());
}

#[test]
fn test_config_validate_shouldRejectBadValues() {
    let mut config = Config::default();
    config.target_language = "auto".into();
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.source_language = "xx-nonsense".into();
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.translation.max_concurrent_files = 0;
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.translation.max_concurrent_units = 0;
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.filter.skip_patterns = vec!["(unclosed".into()];
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.translation.endpoint = "not a url".into();
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.source_language = "eng".into();
    config.target_language = "en-GB".into();
    assert!(config.validate().is_err());
}

#[test]
fn test_logLevel_fromStr_shouldAcceptAliases() {
    assert_eq!("warning".parse::<LogLevel>().unwrap(), LogLevel::Warn);
    assert_eq!("TRACE".parse::<LogLevel>().unwrap(), LogLevel::Trace);
    assert!("loud".parse::<LogLevel>().is_err());
}
