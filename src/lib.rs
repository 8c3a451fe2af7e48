/*!
 * # lingofix
 *
 * Finds human-language text inside source and document files (comments,
 * docstrings, Markdown prose, notebook cells, config values), translates it,
 * and writes the file back byte-identical everywhere else.
 *
 * ## Architecture
 *
 * - `extraction`: format parsers producing byte-span units, and the reconstructor
 * - `translation`: cache, eligibility filters, retry, rate limiting, cancellation
 * - `providers`: translator backends (Ollama, mock)
 * - `database`: SQLite store behind the persisted cache
 * - `app_controller`: the `Dispatcher` running scan, translate and fix
 * - `report`: per-file and per-run reports, text and JSON
 * - `app_config`: `conf.json` loading and validation
 * - `file_utils`: decoding, atomic writes, backups, directory walks
 * - `language_utils`: ISO language codes and script detection
 * - `errors`: error types
 */

// Global lints configuration
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

// Public modules
pub mod app_config;
pub mod app_controller;
pub mod database;
pub mod errors;
pub mod extraction;
pub mod file_utils;
pub mod language_utils;
pub mod providers;
pub mod report;
pub mod translation;

// Re-export main types for easier usage
pub use app_config::Config;
pub use app_controller::{Dispatcher, RunMode, ScanFilter};
pub use errors::{AppError, FileError, ParseError, ReconstructionError, TranslateError};
pub use extraction::{ParserKind, TranslatableUnit, TranslationOutcome, UnitKind};
pub use report::{BatchReport, FileReport, ReportFormat};
pub use translation::{TranslationCache, TranslationService};
