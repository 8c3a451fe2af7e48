/*!
 * Per-file and per-run reports, with text and JSON rendering.
 */

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::extraction::{Priority, TranslatableUnit, TranslationOutcome, UnitKind};
use crate::translation::CacheStats;

/// Exit status of a run that completed without file failures
pub const EXIT_SUCCESS: i32 = 0;
/// At least one file failed outright
pub const EXIT_PARTIAL_FAILURE: i32 = 2;
/// The run was interrupted
pub const EXIT_CANCELLED: i32 = 130;

/// Output format of the final report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ReportFormat {
    #[default]
    Text,
    Json,
}

/// One unit as it appears in a report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnitRecord {
    pub id: usize,
    pub kind: UnitKind,
    pub line: usize,
    pub priority: Priority,
    /// `translated`, `cache-hit`, `skipped`, `failed`, or `eligible` in a scan
    pub outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replacement: Option<String>,
}

impl UnitRecord {
    /// Build a record; `None` means the unit was never resolved (scan mode)
    pub fn new(unit: &TranslatableUnit, outcome: Option<&TranslationOutcome>) -> Self {
        let (label, detail, replacement) = match outcome {
            None => ("eligible", None, None),
            Some(TranslationOutcome::Skipped(reason)) => ("skipped", Some(reason.to_string()), None),
            Some(TranslationOutcome::Failed(error)) => ("failed", Some(error.to_string()), None),
            Some(outcome) => (outcome.label(), None, outcome.replacement().map(str::to_string)),
        };

        Self {
            id: unit.id.0,
            kind: unit.kind,
            line: unit.span.line,
            priority: unit.context.priority,
            outcome: label,
            detail,
            text: unit.text.clone(),
            replacement,
        }
    }
}

/// Unit counters, per file and per run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct UnitCounts {
    pub total: usize,
    pub eligible: usize,
    pub translated: usize,
    pub cache_hits: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl UnitCounts {
    pub fn record(&mut self, outcome: Option<&TranslationOutcome>) {
        self.total += 1;
        match outcome {
            None => self.eligible += 1,
            Some(TranslationOutcome::Translated(_)) => self.translated += 1,
            Some(TranslationOutcome::CacheHit(_)) => self.cache_hits += 1,
            Some(TranslationOutcome::Skipped(_)) => self.skipped += 1,
            Some(TranslationOutcome::Failed(_)) => self.failed += 1,
        }
    }

    pub fn add(&mut self, other: &UnitCounts) {
        self.total += other.total;
        self.eligible += other.eligible;
        self.translated += other.translated;
        self.cache_hits += other.cache_hits;
        self.skipped += other.skipped;
        self.failed += other.failed;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "message", rename_all = "lowercase")]
pub enum FileStatus {
    Succeeded,
    Failed(String),
    Cancelled,
}

impl FileStatus {
    pub fn label(&self) -> &'static str {
        match self {
            FileStatus::Succeeded => "ok",
            FileStatus::Failed(_) => "FAILED",
            FileStatus::Cancelled => "cancelled",
        }
    }
}

/// Result of processing one file
#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parser: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encoding: Option<&'static str>,
    #[serde(flatten)]
    pub status: FileStatus,
    pub counts: UnitCounts,
    pub units: Vec<UnitRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_path: Option<PathBuf>,
    /// Whether the emitted content differs from the input
    pub changed: bool,
}

impl FileReport {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            parser: None,
            encoding: None,
            status: FileStatus::Succeeded,
            counts: UnitCounts::default(),
            units: Vec::new(),
            output_path: None,
            backup_path: None,
            changed: false,
        }
    }

    pub fn fail(mut self, message: impl Into<String>) -> Self {
        self.status = FileStatus::Failed(message.into());
        self
    }

    pub fn cancel(mut self) -> Self {
        self.status = FileStatus::Cancelled;
        self
    }

    pub fn push_unit(&mut self, unit: &TranslatableUnit, outcome: Option<&TranslationOutcome>) {
        self.counts.record(outcome);
        self.units.push(UnitRecord::new(unit, outcome));
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, FileStatus::Failed(_))
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == FileStatus::Cancelled
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct BatchTotals {
    pub files: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub units: UnitCounts,
}

impl BatchTotals {
    pub fn from_files(files: &[FileReport]) -> Self {
        let mut totals = Self::default();
        for file in files {
            totals.files += 1;
            match file.status {
                FileStatus::Succeeded => totals.succeeded += 1,
                FileStatus::Failed(_) => totals.failed += 1,
                FileStatus::Cancelled => totals.cancelled += 1,
            }
            totals.units.add(&file.counts);
        }
        totals
    }
}

/// Result of one run over a set of files
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub run_id: Uuid,
    pub mode: &'static str,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    /// Set when the run observed cancellation
    pub cancelled: bool,
    /// Translations were computed but nothing was written
    pub dry_run: bool,
    pub totals: BatchTotals,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache: Option<CacheStats>,
    pub files: Vec<FileReport>,
}

impl BatchReport {
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }

    /// 130 when cancelled, 2 when any file failed, 0 otherwise
    pub fn exit_code(&self) -> i32 {
        if self.cancelled {
            EXIT_CANCELLED
        } else if self.totals.failed > 0 {
            EXIT_PARTIAL_FAILURE
        } else {
            EXIT_SUCCESS
        }
    }
}

/// Render a report in the requested format
pub fn render(report: &BatchReport, format: ReportFormat, verbose: bool) -> Result<String> {
    match format {
        ReportFormat::Text => Ok(render_text(report, verbose)),
        ReportFormat::Json => render_json(report),
    }
}

pub fn render_json(report: &BatchReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("Failed to serialize report")
}

/// Human-readable report. Scans and dry runs always list their units; other
/// modes only when verbose.
pub fn render_text(report: &BatchReport, verbose: bool) -> String {
    let show_units = verbose || report.dry_run || report.mode == "scan";
    let mut out = String::new();

    for file in &report.files {
        let _ = write!(out, "{:<9} {}", file.status.label(), file.path.display());
        if let Some(parser) = file.parser {
            let _ = write!(out, " [{}]", parser);
        }
        match &file.status {
            FileStatus::Failed(message) => {
                let _ = write!(out, ": {}", message);
            }
            _ => {
                let _ = write!(out, ": {}", describe_counts(&file.counts, report.mode));
                if let Some(output) = &file.output_path {
                    let _ = write!(out, " -> {}", output.display());
                } else if report.dry_run && file.changed {
                    out.push_str(" (would change)");
                }
            }
        }
        out.push('\n');

        if show_units {
            for unit in &file.units {
                let _ = write!(
                    out,
                    "    line {:<5} {:<22} {:<6} {:<10} \"{}\"",
                    unit.line,
                    unit.kind.as_str(),
                    format!("{:?}", unit.priority).to_lowercase(),
                    unit.outcome,
                    preview(&unit.text, 60)
                );
                if let Some(replacement) = &unit.replacement {
                    let _ = write!(out, " -> \"{}\"", preview(replacement, 60));
                }
                if let Some(detail) = &unit.detail {
                    let _ = write!(out, " ({})", detail);
                }
                out.push('\n');
            }
        }
    }

    let totals = &report.totals;
    let _ = writeln!(
        out,
        "Run {}: {} files ({} ok, {} failed, {} cancelled); {}; finished in {}",
        report.run_id,
        totals.files,
        totals.succeeded,
        totals.failed,
        totals.cancelled,
        describe_counts(&totals.units, report.mode),
        format_duration(report.duration())
    );
    if let Some(cache) = &report.cache {
        let _ = writeln!(
            out,
            "Cache: {} hits, {} misses ({:.0}% hit rate), {} translator calls",
            cache.hits,
            cache.misses,
            cache.hit_rate() * 100.0,
            cache.translator_calls
        );
    }
    if report.dry_run {
        out.push_str("Dry run: no file was written\n");
    }
    if report.cancelled {
        out.push_str("Run was cancelled before completion\n");
    }

    out
}

fn describe_counts(counts: &UnitCounts, mode: &str) -> String {
    if mode == "scan" {
        format!(
            "{} units, {} eligible, {} skipped",
            counts.total, counts.eligible, counts.skipped
        )
    } else {
        format!(
            "{} units, {} translated, {} cache hits, {} skipped, {} failed",
            counts.total, counts.translated, counts.cache_hits, counts.skipped, counts.failed
        )
    }
}

/// Single-line preview of unit text
fn preview(text: &str, max_chars: usize) -> String {
    let flat: String = text
        .chars()
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect();
    if flat.chars().count() <= max_chars {
        flat
    } else {
        let head: String = flat.chars().take(max_chars).collect();
        format!("{}...", head)
    }
}

// Format duration in a human-readable format
pub fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}.{:03}s", seconds, duration.subsec_millis())
    }
}
