use anyhow::{Context, Result};
use chrono::Utc;
use futures::stream::{self, StreamExt};
use log::{debug, error, info, warn};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use crate::app_config::Config;
use crate::errors::{AppError, FileError, ReconstructionError};
use crate::extraction::{Outcomes, ParserKind, Priority, SkipReason, TranslationOutcome, UnitKind};
use crate::file_utils::FileManager;
use crate::providers::Translator;
use crate::report::{BatchReport, BatchTotals, FileReport, format_duration};
use crate::translation::{BatchTranslator, CancellationFlag, TranslationCache, TranslationService, UnitFilter};

// @module: Dispatcher running scan, translate and fix over files

/// What the dispatcher does with each file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunMode {
    /// Extract and report, never translate or write
    Scan,
    /// Write `<stem>.<target>.<ext>` next to the file or under `output_dir`
    Translate { output_dir: Option<PathBuf> },
    /// Overwrite the original, optionally keeping `<name>.backup`
    Fix { backup: bool },
}

impl RunMode {
    pub fn name(&self) -> &'static str {
        match self {
            RunMode::Scan => "scan",
            RunMode::Translate { .. } => "translate",
            RunMode::Fix { .. } => "fix",
        }
    }
}

/// Ask before `fix` rewrites files in place. Anything but `y`/`yes` declines,
/// including end of input.
pub fn confirm_in_place<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    file_count: usize,
    backup: bool,
) -> std::io::Result<bool> {
    write!(
        output,
        "About to rewrite {} file{} in place ({}). Continue? [y/N] ",
        file_count,
        if file_count == 1 { "" } else { "s" },
        if backup { "backups will be kept" } else { "NO backups" }
    )?;
    output.flush()?;

    let mut answer = String::new();
    input.read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}

/// Narrows the units listed by a scan
#[derive(Debug, Clone, Default)]
pub struct ScanFilter {
    /// Empty means every kind
    pub kinds: Vec<UnitKind>,
    pub min_priority: Option<Priority>,
}

impl ScanFilter {
    pub fn matches(&self, kind: UnitKind, priority: Priority) -> bool {
        (self.kinds.is_empty() || self.kinds.contains(&kind))
            && self.min_priority.is_none_or(|min| priority >= min)
    }
}

/// Runs one mode over a set of files
pub struct Dispatcher {
    // @field: Scan, translate or fix
    mode: RunMode,

    // @field: Per-file unit resolution
    batch: BatchTranslator,

    // @field: Eligibility rules
    filter: UnitFilter,

    scan_filter: ScanFilter,

    // @field: Translate and rebuild, but write nothing
    dry_run: bool,

    max_concurrent_files: usize,
}

impl Dispatcher {
    pub fn new(mode: RunMode, batch: BatchTranslator, filter: UnitFilter) -> Self {
        Self {
            mode,
            batch,
            filter,
            scan_filter: ScanFilter::default(),
            dry_run: false,
            max_concurrent_files: 4,
        }
    }

    // @method: Wire the translation stack from the configuration
    pub fn from_config(
        config: &Config,
        mode: RunMode,
        translator: Arc<dyn Translator>,
        cache: TranslationCache,
        cancel: CancellationFlag,
    ) -> Result<Self> {
        let service = TranslationService::from_config(config, translator, cache, cancel);
        let filter = UnitFilter::new(&config.filter, &config.source_language, &config.target_language)
            .context("Invalid skip pattern in filter configuration")?;
        let batch = BatchTranslator::new(service, config.translation.max_concurrent_units);

        Ok(Self::new(mode, batch, filter).with_max_concurrent_files(config.translation.max_concurrent_files))
    }

    pub fn with_scan_filter(mut self, scan_filter: ScanFilter) -> Self {
        self.scan_filter = scan_filter;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_max_concurrent_files(mut self, max_concurrent_files: usize) -> Self {
        self.max_concurrent_files = max_concurrent_files.max(1);
        self
    }

    pub fn mode(&self) -> &RunMode {
        &self.mode
    }

    pub fn service(&self) -> &TranslationService {
        self.batch.service()
    }

    fn cancellation(&self) -> &CancellationFlag {
        self.batch.service().cancellation()
    }

    /// Process every file, at most `max_concurrent_files` at a time
    pub async fn run_batch(&self, paths: &[PathBuf], progress: impl Fn(&FileReport)) -> BatchReport {
        let start_time = Instant::now();
        let started_at = Utc::now();
        let run_id = Uuid::new_v4();

        info!(
            "Run {} ({}{}): {} files, {} at a time",
            run_id,
            self.mode.name(),
            if self.dry_run { ", dry run" } else { "" },
            paths.len(),
            self.max_concurrent_files
        );

        let planned: Vec<Option<PathBuf>> = match &self.mode {
            RunMode::Translate { output_dir: Some(dir) } => {
                let target = self.service().target_language();
                FileManager::mirrored_output_paths(paths, dir, target).into_iter().map(Some).collect()
            }
            _ => vec![None; paths.len()],
        };

        let mut results = stream::iter(paths.iter().zip(planned))
            .map(|(path, output_path)| self.process_planned(path, output_path))
            .buffer_unordered(self.max_concurrent_files);

        let mut files = Vec::with_capacity(paths.len());
        while let Some(report) = results.next().await {
            progress(&report);
            files.push(report);
        }
        drop(results);

        files.sort_by(|a, b| a.path.cmp(&b.path));

        let totals = BatchTotals::from_files(&files);
        let cancelled = self.cancellation().is_cancelled() || totals.cancelled > 0;
        let duration = start_time.elapsed();
        let cache = match self.mode {
            RunMode::Scan => None,
            _ => Some(self.service().cache().stats()),
        };

        info!(
            "Run {} finished in {}: {} ok, {} failed, {} cancelled",
            run_id,
            format_duration(duration),
            totals.succeeded,
            totals.failed,
            totals.cancelled
        );

        BatchReport {
            run_id,
            mode: self.mode.name(),
            started_at,
            duration_ms: duration.as_millis() as u64,
            cancelled,
            dry_run: self.dry_run && self.mode != RunMode::Scan,
            totals,
            cache,
            files,
        }
    }

    /// Process one file. Never fails: problems are recorded in the report.
    pub async fn process_file(&self, path: &Path) -> FileReport {
        self.process_planned(path, None).await
    }

    /// `output_path` overrides where translate mode writes
    async fn process_planned(&self, path: &Path, output_path: Option<PathBuf>) -> FileReport {
        let report = FileReport::new(path);

        if self.cancellation().is_cancelled() {
            debug!("Skipping {:?}, run cancelled", path);
            return report.cancel();
        }

        match self.process_inner(path, output_path, report).await {
            Ok(report) => {
                if report.is_cancelled() {
                    info!("{}: cancelled, nothing written", path.display());
                } else {
                    info!(
                        "{}: {} units, {} translated, {} cache hits, {} skipped, {} failed",
                        path.display(),
                        report.counts.total,
                        report.counts.translated,
                        report.counts.cache_hits,
                        report.counts.skipped,
                        report.counts.failed
                    );
                }
                report
            }
            Err((report, e)) => {
                warn!("{}: {}", path.display(), e);
                report.fail(e.to_string())
            }
        }
    }

    async fn process_inner(
        &self,
        path: &Path,
        planned_output: Option<PathBuf>,
        mut report: FileReport,
    ) -> std::result::Result<FileReport, (FileReport, AppError)> {
        let decoded = match FileManager::read_text(path) {
            Ok(decoded) => decoded,
            Err(e) => return Err((report, e.into())),
        };
        report.encoding = Some(decoded.encoding.label());

        let Some(parser) = ParserKind::detect(path, &decoded.content) else {
            return Err((report, FileError::Unsupported(path.to_path_buf()).into()));
        };
        report.parser = Some(parser.name());

        let parsed = match parser.extract(&decoded.content) {
            Ok(parsed) => parsed,
            Err(e) => return Err((report, e.into())),
        };
        debug!("{}: {} units via {} parser", path.display(), parsed.units.len(), parser.name());

        let skipped = self.filter.apply(&parsed.units);

        if self.mode == RunMode::Scan {
            for unit in &parsed.units {
                if self.scan_filter.matches(unit.kind, unit.context.priority) {
                    report.push_unit(unit, skipped.get(&unit.id));
                }
            }
            return Ok(report);
        }

        let outcomes = self
            .batch
            .resolve_units(&parsed.units, skipped, |unit, outcome| {
                debug!("{} {} line {}: {}", path.display(), unit.id, unit.span.line, outcome.label());
            })
            .await;

        for unit in &parsed.units {
            report.push_unit(unit, outcomes.get(&unit.id));
        }

        if self.cancellation().is_cancelled() || has_cancelled_unit(&outcomes) {
            return Ok(report.cancel());
        }

        let rebuilt = match parser.reconstruct(&parsed.content, &parsed.units, &outcomes) {
            Ok(rebuilt) => rebuilt,
            Err(e) => {
                error!("{}: {}", path.display(), e);
                return Err((report, e.into()));
            }
        };

        if let Err(e) = check_identity(&parsed.content, &rebuilt, &outcomes) {
            error!("{}: {}", path.display(), e);
            return Err((report, e.into()));
        }

        report.changed = rebuilt != parsed.content;

        if self.dry_run {
            debug!("{}: dry run, changed = {}", path.display(), report.changed);
            return Ok(report);
        }

        match &self.mode {
            RunMode::Scan => {}
            RunMode::Translate { output_dir } => {
                let output_path = planned_output.unwrap_or_else(|| {
                    FileManager::generate_output_path(path, output_dir.as_deref(), self.service().target_language())
                });
                if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    if let Err(e) = FileManager::ensure_dir(parent) {
                        return Err((report, e.into()));
                    }
                }
                if let Err(e) = FileManager::write_atomic(&output_path, &rebuilt, decoded.encoding) {
                    return Err((report, e.into()));
                }
                report.output_path = Some(output_path);
            }
            RunMode::Fix { backup } => {
                if !report.changed {
                    debug!("{}: unchanged, nothing written", path.display());
                    return Ok(report);
                }
                if *backup {
                    match FileManager::create_backup(path) {
                        Ok(backup_path) => report.backup_path = Some(backup_path),
                        Err(e) => return Err((report, e.into())),
                    }
                }
                if let Err(e) = FileManager::write_atomic(path, &rebuilt, decoded.encoding) {
                    return Err((report, e.into()));
                }
                report.output_path = Some(path.to_path_buf());
            }
        }

        Ok(report)
    }
}

fn has_cancelled_unit(outcomes: &Outcomes) -> bool {
    outcomes
        .values()
        .any(|outcome| *outcome == TranslationOutcome::Skipped(SkipReason::Cancelled))
}

/// Reconstructing without a single replacement must reproduce the input
fn check_identity(original: &str, rebuilt: &str, outcomes: &Outcomes) -> Result<(), ReconstructionError> {
    let replaced = outcomes.values().any(|outcome| outcome.replacement().is_some());
    if !replaced && rebuilt != original {
        return Err(ReconstructionError::InvariantViolation(format!(
            "no unit was replaced but the output differs from the input ({} vs {} bytes)",
            rebuilt.len(),
            original.len()
        )));
    }
    Ok(())
}
