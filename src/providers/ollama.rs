use async_trait::async_trait;
use log::{debug, error};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use crate::errors::TranslateError;
use crate::language_utils;
use crate::providers::Translator;

/// Ollama translator talking to a local `/api/generate` endpoint
///
/// Retries and throttling are left to the translation service; a call here is
/// one HTTP request whose failure is mapped onto `TranslateError`.
#[derive(Debug, Clone)]
pub struct OllamaTranslator {
    /// Base URL of the Ollama API
    base_url: Url,
    model: String,
    /// HTTP client for making requests
    client: Client,
    timeout: Duration,
}

/// Generate request for the Ollama API
#[derive(Debug, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Model name to use for generation
    model: String,
    /// Prompt to generate from
    prompt: String,
    /// System message to guide the model
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    /// Additional model parameters
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<GenerationOptions>,
    /// Whether to stream the response
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

/// Generation options for the Ollama API
#[derive(Debug, Serialize, Deserialize)]
pub struct GenerationOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<u64>,
}

/// Generation response from the Ollama API
#[derive(Debug, Serialize, Deserialize)]
pub struct GenerationResponse {
    #[serde(default)]
    pub model: String,
    /// Generated text
    pub response: String,
    #[serde(default)]
    pub done: bool,
}

impl GenerationRequest {
    /// Build a deterministic translation request
    pub fn translation(model: &str, text: &str, source_language: &str, target_language: &str) -> Self {
        let source = language_name(source_language);
        let target = language_name(target_language);
        let system = format!(
            "You translate comments and documentation embedded in source files from {} to {}. \
             Reply with the translation only. Keep line breaks, inline code, identifiers, \
             URLs and Markdown markup unchanged. Do not add quotes or explanations.",
            source, target
        );

        Self {
            model: model.to_string(),
            prompt: text.to_string(),
            system: Some(system),
            options: Some(GenerationOptions {
                temperature: Some(0.0),
                seed: Some(42),
            }),
            stream: Some(false),
        }
    }
}

fn language_name(code: &str) -> String {
    if language_utils::is_auto(code) {
        return "the detected source language".to_string();
    }
    language_utils::get_language_name(code).unwrap_or_else(|_| code.to_string())
}

impl OllamaTranslator {
    /// Create a translator for `endpoint` (e.g. `http://localhost:11434`)
    pub fn new(endpoint: &str, model: &str, timeout: Duration) -> Result<Self, anyhow::Error> {
        let mut base_url = Url::parse(endpoint)
            .map_err(|e| anyhow::anyhow!("Invalid Ollama endpoint '{}': {}", endpoint, e))?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = Client::builder()
            .timeout(timeout)
            // Ollama speaks HTTP/1.1
            .http1_only()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(20)
            .tcp_keepalive(Duration::from_secs(60))
            .build()
            .unwrap_or_default();

        Ok(Self {
            base_url,
            model: model.to_string(),
            client,
            timeout,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, TranslateError> {
        self.base_url
            .join(path)
            .map_err(|e| TranslateError::Unknown(format!("bad endpoint path {}: {}", path, e)))
    }

    /// Check that the server answers at all
    pub async fn test_connection(&self) -> Result<(), TranslateError> {
        let url = self.endpoint("api/tags")?;
        let response = self.client.get(url).send().await.map_err(|e| self.map_transport_error(e))?;
        match map_status(response.status(), "") {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Generate text from the Ollama API
    pub async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResponse, TranslateError> {
        let url = self.endpoint("api/generate")?;

        let response = self
            .client
            .post(url)
            .json(request)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| self.map_transport_error(e))?;

        if let Some(err) = map_status(status, &body) {
            error!("Ollama API error ({}): {}", status, truncate(&body, 200));
            return Err(err);
        }

        parse_generation(&body)
    }

    fn map_transport_error(&self, e: reqwest::Error) -> TranslateError {
        if e.is_timeout() {
            TranslateError::Timeout(self.timeout.as_millis() as u64)
        } else if e.is_connect() || e.is_request() {
            TranslateError::Unavailable(format!("cannot reach Ollama at {}: {}", self.base_url, e))
        } else if let Some(status) = e.status() {
            map_status(status, "").unwrap_or_else(|| TranslateError::Unknown(e.to_string()))
        } else {
            TranslateError::Unavailable(e.to_string())
        }
    }
}

/// Error for a non-success status, `None` on success
fn map_status(status: StatusCode, body: &str) -> Option<TranslateError> {
    if status.is_success() {
        return None;
    }
    let message = format!("HTTP {}: {}", status.as_u16(), truncate(body, 200));
    let err = if status == StatusCode::TOO_MANY_REQUESTS {
        TranslateError::RateLimited(message)
    } else if status.is_server_error() {
        TranslateError::Unavailable(message)
    } else {
        TranslateError::Unknown(message)
    };
    Some(err)
}

/// Parse a single JSON object, or the concatenation of a JSON-lines stream
fn parse_generation(body: &str) -> Result<GenerationResponse, TranslateError> {
    if let Ok(response) = serde_json::from_str::<GenerationResponse>(body) {
        return Ok(response);
    }

    let mut combined = String::new();
    let mut model = String::new();
    let mut done = false;
    let mut parsed_any = false;
    for line in body.lines().filter(|l| !l.trim().is_empty()) {
        let Ok(part) = serde_json::from_str::<GenerationResponse>(line) else {
            continue;
        };
        parsed_any = true;
        combined.push_str(&part.response);
        model = part.model;
        done |= part.done;
    }

    if parsed_any {
        debug!("Assembled streamed Ollama response");
        Ok(GenerationResponse {
            model,
            response: combined,
            done,
        })
    } else {
        Err(TranslateError::Unknown(format!(
            "unparseable Ollama response: {}",
            truncate(body, 200)
        )))
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[async_trait]
impl Translator for OllamaTranslator {
    async fn translate(
        &self,
        text: &str,
        source_language: &str,
        target_language: &str,
    ) -> Result<String, TranslateError> {
        let request = GenerationRequest::translation(&self.model, text, source_language, target_language);
        let response = self.generate(&request).await?;
        let translated = response.response.trim().to_string();
        if translated.is_empty() {
            return Err(TranslateError::Unknown("Ollama returned an empty translation".into()));
        }
        Ok(translated)
    }

    fn name(&self) -> &str {
        "ollama"
    }
}
