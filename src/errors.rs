/*!
 * Error types for the lingofix application.
 *
 * Each layer owns one enum, using the thiserror crate for ergonomic error definitions:
 * parsers fail with `ParseError`, translator backends with `TranslateError`,
 * the persisted cache with `CacheError`, and reconstruction with `ReconstructionError`.
 * File-level problems are collected into `FileError` and the top-level `AppError`.
 */

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while tokenizing a file into units
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The parser could not tokenize the input at all
    #[error("malformed {parser} input: {message}")]
    MalformedInput {
        /// Name of the parser that rejected the content
        parser: &'static str,
        /// What went wrong
        message: String,
    },
}

impl ParseError {
    pub fn malformed(parser: &'static str, message: impl Into<String>) -> Self {
        Self::MalformedInput {
            parser,
            message: message.into(),
        }
    }
}

/// Errors returned by a translator backend.
///
/// These are unit-level: the dispatcher retries the transient ones and
/// degrades the unit to its original text when a call finally fails.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TranslateError {
    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("translator unavailable: {0}")]
    Unavailable(String),

    #[error("unsupported language pair {source_language} -> {target_language}")]
    UnsupportedLanguage {
        source_language: String,
        target_language: String,
    },

    #[error("translator call timed out after {0} ms")]
    Timeout(u64),

    #[error("translation failed: {0}")]
    Unknown(String),
}

impl TranslateError {
    /// Whether a retry can reasonably succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::RateLimited(_) | Self::Unavailable(_) | Self::Timeout(_)
        )
    }
}

/// Persisted cache failures. Never fatal: callers fall back to the translator.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("cache I/O error: {0}")]
    Io(String),
}

/// Raised when spans handed to the reconstructor break the ordering contract.
/// This signals a parser defect; the file must not be written.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReconstructionError {
    #[error("reconstruction invariant violated: {0}")]
    InvariantViolation(String),
}

/// File-level failures reported per file in a batch
#[derive(Error, Debug)]
pub enum FileError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}: {message}")]
    Write { path: PathBuf, message: String },

    #[error("failed to back up {path}: {source}")]
    Backup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} is not valid text: {message}")]
    Decode { path: PathBuf, message: String },

    #[error("no parser handles {0}")]
    Unsupported(PathBuf),
}

/// Main application error type that wraps all other errors
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File error: {0}")]
    File(#[from] FileError),

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Reconstruction error: {0}")]
    Reconstruction(#[from] ReconstructionError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Translation error: {0}")]
    Translate(#[from] TranslateError),

    /// Any other error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::Unknown(error.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::Unknown(format!("I/O: {}", error))
    }
}
