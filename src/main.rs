// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result, anyhow};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{Shell, generate};
use indicatif::{ProgressBar, ProgressStyle};
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError, debug, info, warn};
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use lingofix::app_config::{self, Config, TranslationProvider};
use lingofix::app_controller::{Dispatcher, RunMode, ScanFilter, confirm_in_place};
use lingofix::database::{CacheRepository, DatabaseConnection};
use lingofix::errors::CacheError;
use lingofix::extraction::{Priority, UnitKind};
use lingofix::file_utils::{FileManager, TextEncoding};
use lingofix::providers::{Translator, create_translator};
use lingofix::report::{self, ReportFormat};
use lingofix::translation::{CancellationFlag, TranslationCache};

/// CLI Wrapper for TranslationProvider to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliTranslationProvider {
    Mock,
    Ollama,
}

impl From<CliTranslationProvider> for TranslationProvider {
    fn from(cli_provider: CliTranslationProvider) -> Self {
        match cli_provider {
            CliTranslationProvider::Mock => TranslationProvider::Mock,
            CliTranslationProvider::Ollama => TranslationProvider::Ollama,
        }
    }
}

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for app_config::LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => app_config::LogLevel::Error,
            CliLogLevel::Warn => app_config::LogLevel::Warn,
            CliLogLevel::Info => app_config::LogLevel::Info,
            CliLogLevel::Debug => app_config::LogLevel::Debug,
            CliLogLevel::Trace => app_config::LogLevel::Trace,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List translatable units without translating anything
    Scan {
        /// Files or directories to scan
        #[arg(value_name = "PATH", required = true)]
        paths: Vec<PathBuf>,

        /// Only list units of this kind (repeatable)
        #[arg(long = "kind", value_parser = parse_unit_kind)]
        kinds: Vec<UnitKind>,

        /// Only list units at or above this priority
        #[arg(long, value_parser = parse_priority)]
        priority: Option<Priority>,

        /// Write the report to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Write translated copies as `<stem>.<target>.<ext>`
    Translate {
        /// Files or directories to translate
        #[arg(value_name = "PATH", required = true)]
        paths: Vec<PathBuf>,

        /// Directory for the translated copies (default: next to each file)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Translate and report, but write no file
        #[arg(long)]
        dry_run: bool,
    },

    /// Translate files in place
    Fix {
        /// Files or directories to fix
        #[arg(value_name = "PATH", required = true)]
        paths: Vec<PathBuf>,

        /// Do not keep `<name>.backup` copies of the originals
        #[arg(long)]
        no_backup: bool,

        /// Translate and report, but write no file
        #[arg(long)]
        dry_run: bool,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Inspect or clear the persisted translation cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Generate shell completions for lingofix
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand, Debug)]
enum CacheAction {
    /// Show where the cache lives and how many translations it holds
    Stats,
    /// Delete every cached translation
    Clear,
}

/// lingofix - translate the comments and prose inside your files
#[derive(Parser, Debug)]
#[command(name = "lingofix")]
#[command(version)]
#[command(about = "Translate comments, docstrings and prose in source files")]
#[command(long_about = "lingofix finds human-language text in source code, Markdown, notebooks and \
config files, translates it, and leaves every other byte untouched.

EXAMPLES:
    lingofix scan src/                          # List translatable units
    lingofix scan --kind docstring src/         # Only docstrings
    lingofix scan --include '*.py' -o scan.txt  # Python files only, report to a file
    lingofix -t en translate notes.md           # Writes notes.en.md
    lingofix translate --dry-run notes.md       # Preview translations, write nothing
    lingofix -s zh -t en fix src/               # Rewrite files in place, keeping backups
    lingofix fix --yes --exclude 'tests/**' .   # No confirmation prompt
    lingofix --format json fix --no-backup a.py # Machine-readable report
    lingofix completions bash > lingofix.bash   # Generate bash completions

EXIT STATUS:
    0    every file succeeded
    2    at least one file failed
    130  the run was cancelled (Ctrl-C or run timeout)")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true, default_value = "conf.json")]
    config: PathBuf,

    /// Source language code, or 'auto'
    #[arg(short, long, global = true)]
    source: Option<String>,

    /// Target language code (e.g., 'en', 'de', 'ja')
    #[arg(short, long, global = true)]
    target: Option<String>,

    /// Translation provider to use
    #[arg(short, long, global = true, value_enum)]
    provider: Option<CliTranslationProvider>,

    /// Model name to use for translation
    #[arg(short, long, global = true)]
    model: Option<String>,

    /// Set logging level
    #[arg(short, long, global = true, value_enum)]
    log_level: Option<CliLogLevel>,

    /// Report format
    #[arg(long, global = true, value_enum, default_value = "text")]
    format: ReportFormat,

    /// List every unit in the report
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Neither read nor write the translation cache
    #[arg(long, global = true)]
    no_cache: bool,

    /// Number of files processed concurrently
    #[arg(short, long, global = true)]
    jobs: Option<usize>,

    /// Only walk files matching this glob (repeatable, e.g. 'src/**/*.rs')
    #[arg(long, global = true)]
    include: Vec<String>,

    /// Skip walked files matching this glob (repeatable)
    #[arg(long, global = true)]
    exclude: Vec<String>,
}

fn parse_unit_kind(value: &str) -> Result<UnitKind, String> {
    UnitKind::parse(value).ok_or_else(|| {
        let known: Vec<&str> = UnitKind::all().iter().map(|kind| kind.as_str()).collect();
        format!("unknown unit kind '{}' (expected one of: {})", value, known.join(", "))
    })
}

fn parse_priority(value: &str) -> Result<Priority, String> {
    Priority::parse(value).ok_or_else(|| format!("unknown priority '{}' (expected low, medium or high)", value))
}

// @struct: Custom logger implementation
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    // @creates: New logger with specified level
    fn new(level: LevelFilter) -> Self {
        CustomLogger { level }
    }

    // @initializes: Global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        // The boxed logger accepts everything; `set_max_level` does the filtering
        let logger = Box::new(CustomLogger::new(LevelFilter::Trace));
        log::set_boxed_logger(logger)?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: ANSI color and tag for a level
    fn style_for_level(level: Level) -> (&'static str, &'static str) {
        match level {
            Level::Error => ("\x1B[1;31m", "ERROR"),
            Level::Warn => ("\x1B[1;33m", "WARN "),
            Level::Info => ("\x1B[1;32m", "INFO "),
            Level::Debug => ("\x1B[1;36m", "DEBUG"),
            Level::Trace => ("\x1B[1;35m", "TRACE"),
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level && metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");
            let (color, tag) = Self::style_for_level(record.level());

            let mut stderr = std::io::stderr();
            let _ = writeln!(stderr, "{}{} {}\x1B[0m {}", color, now, tag, record.args());
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    CustomLogger::init(LevelFilter::Info)?;

    let cli = CommandLineOptions::parse();

    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = CommandLineOptions::command();
        generate(*shell, &mut cmd, "lingofix", &mut std::io::stdout());
        return Ok(());
    }

    let config = load_config(&cli)?;
    log::set_max_level(config.log_level.to_level_filter());
    debug!("Configuration: {:?}", config);

    let mode = match &cli.command {
        Commands::Cache { action } => return run_cache_action(&config, action).await,
        Commands::Completions { .. } => return Ok(()),
        Commands::Scan { .. } => RunMode::Scan,
        Commands::Translate { output_dir, .. } => RunMode::Translate {
            output_dir: output_dir.clone().or_else(|| config.output.output_dir.clone()),
        },
        Commands::Fix { no_backup, .. } => RunMode::Fix {
            backup: config.output.backup && !no_backup,
        },
    };

    let exit_code = run(&cli, config, mode).await?;
    std::process::exit(exit_code);
}

/// Load `conf.json` (or defaults) and apply command line overrides
fn load_config(cli: &CommandLineOptions) -> Result<Config> {
    let mut config = if cli.config.exists() {
        Config::from_file(&cli.config)?
    } else {
        debug!("Config file not found at {:?}, using defaults", cli.config);
        Config::default()
    };

    if let Some(provider) = &cli.provider {
        config.translation.provider = provider.clone().into();
    }
    if let Some(model) = &cli.model {
        config.translation.model = model.clone();
    }
    if let Some(source) = &cli.source {
        config.source_language = source.clone();
    }
    if let Some(target) = &cli.target {
        config.target_language = target.clone();
    }
    if let Some(log_level) = &cli.log_level {
        config.log_level = log_level.clone().into();
    }
    if let Some(jobs) = cli.jobs {
        config.translation.max_concurrent_files = jobs;
    }
    if cli.no_cache {
        config.cache.enabled = false;
    }
    config.files.include.extend(cli.include.iter().cloned());
    config.files.exclude.extend(cli.exclude.iter().cloned());

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

async fn run(cli: &CommandLineOptions, config: Config, mode: RunMode) -> Result<i32> {
    let (paths, scan_filter, dry_run, report_file) = match &cli.command {
        Commands::Scan {
            paths,
            kinds,
            priority,
            output,
        } => (
            paths,
            ScanFilter {
                kinds: kinds.clone(),
                min_priority: *priority,
            },
            false,
            output.as_ref(),
        ),
        Commands::Translate { paths, dry_run, .. } | Commands::Fix { paths, dry_run, .. } => {
            (paths, ScanFilter::default(), *dry_run, None)
        }
        _ => return Err(anyhow!("not a file command")),
    };

    let files = collect_inputs(paths, &config)?;
    if files.is_empty() {
        warn!("No supported files found");
    }

    if let (Commands::Fix { yes: false, .. }, RunMode::Fix { backup }) = (&cli.command, &mode) {
        if !dry_run && !files.is_empty() {
            let stdin = std::io::stdin();
            let confirmed = confirm_in_place(&mut stdin.lock(), &mut std::io::stderr(), files.len(), *backup)
                .context("Failed to read confirmation")?;
            if !confirmed {
                eprintln!("Aborted, nothing was written (pass --yes to skip this prompt)");
                return Ok(report::EXIT_CANCELLED);
            }
        }
    }

    let cancel = CancellationFlag::new();
    cancel.cancel_on_ctrl_c();
    if let Some(secs) = config.translation.run_timeout_secs {
        cancel.cancel_after(Duration::from_secs(secs));
    }

    let cache = match mode {
        RunMode::Scan => TranslationCache::new(false),
        _ => build_cache(&config),
    };
    let translator = create_translator(&config)?;
    info!(
        "Using {} ({} -> {})",
        translator.name(),
        config.source_language,
        config.target_language
    );

    let dispatcher = Dispatcher::from_config(&config, mode, translator, cache, cancel)?
        .with_scan_filter(scan_filter)
        .with_dry_run(dry_run);

    let progress_bar = if cli.format == ReportFormat::Text && files.len() > 1 {
        let pb = ProgressBar::new(files.len() as u64);
        let template_result = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files ({percent}%) {msg} {eta}")
            .or_else(|_| ProgressStyle::default_bar().template("{spinner} [{elapsed_precise}] [{bar:40}] {pos}/{len} ({percent}%) {msg}"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        pb.set_style(template_result.progress_chars("=> "));
        pb.set_message(dispatcher.mode().name());
        Some(pb)
    } else {
        None
    };

    let batch_report = dispatcher
        .run_batch(&files, |file| {
            if let Some(pb) = &progress_bar {
                let name = file
                    .path
                    .file_name()
                    .map(|f| f.to_string_lossy().to_string())
                    .unwrap_or_default();
                pb.set_message(name);
                pb.inc(1);
            }
        })
        .await;

    if let Some(pb) = progress_bar {
        pb.finish_and_clear();
    }

    let rendered = report::render(&batch_report, cli.format, cli.verbose)?;
    if let Some(report_file) = report_file {
        FileManager::write_atomic(report_file, &rendered, TextEncoding::Utf8)
            .with_context(|| format!("Failed to write report to {}", report_file.display()))?;
        info!("Report written to {}", report_file.display());
        return Ok(batch_report.exit_code());
    }

    let mut stdout = std::io::stdout();
    write!(stdout, "{}", rendered).context("Failed to write report")?;
    if cli.format == ReportFormat::Json {
        writeln!(stdout).context("Failed to write report")?;
    }
    stdout.flush().context("Failed to write report")?;

    Ok(batch_report.exit_code())
}

/// Expand directories into the supported files beneath them
fn collect_inputs(paths: &[PathBuf], config: &Config) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        if FileManager::dir_exists(path) {
            let found = FileManager::collect_files(path, &config.files, Some(&config.target_language))?;
            debug!("{}: {} supported files", path.display(), found.len());
            files.extend(found);
        } else {
            // Reported per file, including missing ones
            files.push(path.clone());
        }
    }
    files.sort();
    files.dedup();
    Ok(files)
}

/// In-memory cache, persisted through SQLite unless disabled
fn build_cache(config: &Config) -> TranslationCache {
    if !config.cache.enabled {
        return TranslationCache::new(false);
    }
    if !config.cache.persist {
        return TranslationCache::new(true);
    }

    match open_store(config) {
        Ok(store) => {
            debug!("Persisting translations to {}", store.connection().path().display());
            TranslationCache::with_store(store)
        }
        Err(e) => {
            warn!("{}; using an in-memory cache", CacheError::Io(format!("{:#}", e)));
            TranslationCache::new(true)
        }
    }
}

fn open_store(config: &Config) -> Result<CacheRepository> {
    let connection = match &config.cache.path {
        Some(path) => DatabaseConnection::new(path)?,
        None => DatabaseConnection::new_default()?,
    };
    Ok(CacheRepository::new(connection))
}

async fn run_cache_action(config: &Config, action: &CacheAction) -> Result<()> {
    let store = open_store(config).context("Failed to open the translation cache")?;
    let path = store.connection().path().display().to_string();

    match action {
        CacheAction::Stats => {
            let count = store.count().await?;
            println!("{}: {} cached translations", path, count);
        }
        CacheAction::Clear => {
            let cache = TranslationCache::with_store(store);
            cache.clear().await.context("Failed to clear the translation cache")?;
            println!("{}: cleared", path);
        }
    }
    Ok(())
}
