use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::default::Default;
use std::path::{Path, PathBuf};

use crate::extraction::Priority;
use crate::language_utils;

/// Application configuration module
/// This module handles loading and validating `conf.json`.
/// Every field has a serde default, so a partial file is enough.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Source language code (ISO), or `auto`
    #[serde(default = "default_source_language")]
    pub source_language: String,

    /// Target language code (ISO)
    #[serde(default = "default_target_language")]
    pub target_language: String,

    #[serde(default)]
    pub translation: TranslationConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub filter: FilterConfig,

    #[serde(default)]
    pub output: OutputConfig,

    #[serde(default)]
    pub files: FilesConfig,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Translation provider type
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TranslationProvider {
    /// Deterministic offline translator
    Mock,
    #[default]
    Ollama,
}

impl TranslationProvider {
    pub fn display_name(&self) -> &str {
        match self {
            Self::Mock => "Mock",
            Self::Ollama => "Ollama",
        }
    }

    pub fn to_lowercase_string(&self) -> String {
        match self {
            Self::Mock => "mock".to_string(),
            Self::Ollama => "ollama".to_string(),
        }
    }
}

impl std::fmt::Display for TranslationProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_lowercase_string())
    }
}

impl std::str::FromStr for TranslationProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "mock" => Ok(Self::Mock),
            "ollama" => Ok(Self::Ollama),
            _ => Err(anyhow!("Invalid provider type: {}", s)),
        }
    }
}

/// Translation service configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TranslationConfig {
    #[serde(default)]
    pub provider: TranslationProvider,

    /// Model name (e.g., "llama3", "mistral")
    #[serde(default = "default_ollama_model")]
    pub model: String,

    /// Service endpoint URL
    #[serde(default = "default_ollama_endpoint")]
    pub endpoint: String,

    /// Per-call timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Requests per minute across all workers; `None` or 0 disables throttling
    #[serde(default)]
    pub rate_limit: Option<u32>,

    /// Retries after the first attempt, transient errors only
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,

    /// Base backoff in milliseconds, doubled on each retry
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    #[serde(default = "default_max_concurrent_files")]
    pub max_concurrent_files: usize,

    /// Units in flight per file
    #[serde(default = "default_max_concurrent_units")]
    pub max_concurrent_units: usize,

    /// Cancel the whole run after this many seconds
    #[serde(default)]
    pub run_timeout_secs: Option<u64>,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            provider: TranslationProvider::default(),
            model: default_ollama_model(),
            endpoint: default_ollama_endpoint(),
            timeout_secs: default_timeout_secs(),
            rate_limit: None,
            retry_count: default_retry_count(),
            retry_backoff_ms: default_retry_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            max_concurrent_files: default_max_concurrent_files(),
            max_concurrent_units: default_max_concurrent_units(),
            run_timeout_secs: None,
        }
    }
}

/// Translation cache configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Keep translations in SQLite across runs
    #[serde(default = "default_true")]
    pub persist: bool,

    /// Database file; defaults to the user data directory
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            persist: true,
            path: None,
        }
    }
}

/// Eligibility rules applied to extracted units
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct FilterConfig {
    /// Minimum number of characters worth translating
    #[serde(default = "default_min_length")]
    pub min_length: usize,

    #[serde(default = "default_true")]
    pub skip_urls: bool,

    #[serde(default = "default_true")]
    pub skip_code_like: bool,

    /// Regexes; a unit whose text matches any of them is skipped
    #[serde(default)]
    pub skip_patterns: Vec<String>,

    #[serde(default)]
    pub min_priority: Priority,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            min_length: default_min_length(),
            skip_urls: true,
            skip_code_like: true,
            skip_patterns: Vec::new(),
            min_priority: Priority::default(),
        }
    }
}

/// Output configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct OutputConfig {
    /// Copy the original to `<name>.backup` before fixing in place
    #[serde(default = "default_true")]
    pub backup: bool,

    /// Directory for translated copies; next to the input when unset
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            backup: true,
            output_dir: None,
        }
    }
}

/// File selection for directory walks
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct FilesConfig {
    /// Restrict walks to these extensions (without the dot); all supported when empty
    #[serde(default)]
    pub extensions: Vec<String>,

    /// Directory names skipped in addition to the built-in list
    #[serde(default)]
    pub exclude_dirs: Vec<String>,

    /// Glob patterns a walked file must match (any of them); all files when empty
    #[serde(default)]
    pub include: Vec<String>,

    /// Glob patterns that drop a walked file
    #[serde(default)]
    pub exclude: Vec<String>,
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn to_level_filter(self) -> log::LevelFilter {
        match self {
            Self::Error => log::LevelFilter::Error,
            Self::Warn => log::LevelFilter::Warn,
            Self::Info => log::LevelFilter::Info,
            Self::Debug => log::LevelFilter::Debug,
            Self::Trace => log::LevelFilter::Trace,
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "error" => Ok(Self::Error),
            "warn" | "warning" => Ok(Self::Warn),
            "info" => Ok(Self::Info),
            "debug" => Ok(Self::Debug),
            "trace" => Ok(Self::Trace),
            _ => Err(anyhow!("Invalid log level: {}", s)),
        }
    }
}

fn default_source_language() -> String {
    language_utils::AUTO_LANGUAGE.to_string()
}

fn default_target_language() -> String {
    "en".to_string()
}

fn default_ollama_model() -> String {
    "llama3".to_string()
}

fn default_ollama_endpoint() -> String {
    "http://localhost:11434".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_retry_count() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    1000 // doubled on each retry
}

fn default_max_backoff_ms() -> u64 {
    30_000
}

fn default_max_concurrent_files() -> usize {
    4
}

fn default_max_concurrent_units() -> usize {
    8
}

fn default_min_length() -> usize {
    2
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Load `path` when it exists, defaults otherwise
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        if !language_utils::is_auto(&self.source_language) {
            language_utils::validate_language_code(&self.source_language)
                .with_context(|| "Invalid source language")?;
        }

        if language_utils::is_auto(&self.target_language) {
            return Err(anyhow!("Target language cannot be 'auto'"));
        }
        language_utils::validate_language_code(&self.target_language)
            .with_context(|| "Invalid target language")?;
        if language_utils::language_codes_match(&self.source_language, &self.target_language) {
            return Err(anyhow!(
                "Source language '{}' and target language '{}' are the same",
                self.source_language,
                self.target_language
            ));
        }

        if self.translation.max_concurrent_files == 0 {
            return Err(anyhow!("max_concurrent_files must be at least 1"));
        }
        if self.translation.max_concurrent_units == 0 {
            return Err(anyhow!("max_concurrent_units must be at least 1"));
        }
        if self.translation.timeout_secs == 0 {
            return Err(anyhow!("timeout_secs must be at least 1"));
        }

        crate::file_utils::PathPatterns::new(&self.files.include, &self.files.exclude)
            .context("Invalid include or exclude pattern")?;

        for pattern in &self.filter.skip_patterns {
            regex::Regex::new(pattern)
                .with_context(|| format!("Invalid skip pattern: {}", pattern))?;
        }

        if self.translation.provider == TranslationProvider::Ollama {
            url::Url::parse(&self.translation.endpoint)
                .with_context(|| format!("Invalid endpoint URL: {}", self.translation.endpoint))?;
        }

        Ok(())
    }
}

/// Default implementation for Config
impl Default for Config {
    fn default() -> Self {
        Config {
            source_language: default_source_language(),
            target_language: default_target_language(),
            translation: TranslationConfig::default(),
            cache: CacheConfig::default(),
            filter: FilterConfig::default(),
            output: OutputConfig::default(),
            files: FilesConfig::default(),
            log_level: LogLevel::default(),
        }
    }
}
