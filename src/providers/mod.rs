/*!
 * Translator backends.
 *
 * This module contains the external translation boundary:
 * - `mock`: deterministic offline translator used by tests and dry runs
 * - `ollama`: local LLM server over HTTP
 *
 * Only the translation service calls a translator; parsers never do.
 */

use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::app_config::{Config, TranslationProvider};
use crate::errors::TranslateError;

pub mod mock;
pub mod ollama;

pub use mock::{MockBehavior, MockTranslator};
pub use ollama::OllamaTranslator;

/// Common trait for all translator backends
///
/// Implementations report failures with a `TranslateError` variant that tells
/// the retry policy whether another attempt can succeed.
#[async_trait]
pub trait Translator: Send + Sync + Debug {
    /// Translate `text` from `source_language` (or `auto`) to `target_language`
    async fn translate(
        &self,
        text: &str,
        source_language: &str,
        target_language: &str,
    ) -> Result<String, TranslateError>;

    /// Backend name for logs and reports
    fn name(&self) -> &str;
}

/// Build the translator selected in the configuration
pub fn create_translator(config: &Config) -> anyhow::Result<Arc<dyn Translator>> {
    let translator: Arc<dyn Translator> = match config.translation.provider {
        TranslationProvider::Mock => Arc::new(MockTranslator::prefix(format!(
            "[{}] ",
            config.target_language
        ))),
        TranslationProvider::Ollama => Arc::new(OllamaTranslator::new(
            &config.translation.endpoint,
            &config.translation.model,
            Duration::from_secs(config.translation.timeout_secs),
        )?),
    };
    Ok(translator)
}
