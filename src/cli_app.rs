//! Top-level CLI definition and dispatch.

use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::{Shell as CompletionShell, generate};
use colored::{Colorize, control};
use thiserror::Error;

use integrity_sentry::core::config::Config;
use integrity_sentry::core::errors::SentryError;
use integrity_sentry::logger::jsonl::{EventType, JsonlWriter, LogEntry, Severity};
use integrity_sentry::notify::{NotificationManager, ScanEvent};
use integrity_sentry::scanner::aggregate::ScanReport;
use integrity_sentry::scanner::digest::ChunkedSha256;
use integrity_sentry::scanner::{CancelToken, ScanEngine, ScanOptions};
use integrity_sentry::snapshot;

/// Errors surfaced to the top-level `main` (exit code 1).
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Sentry(#[from] SentryError),

    /// The scan was cancelled mid-flight. The partial report was printed but
    /// nothing was persisted or notified.
    #[error("scan interrupted before completion; snapshot left untouched")]
    Interrupted,

    #[error("output failure: {0}")]
    Output(#[from] io::Error),
}

/// Integrity Sentry — file-integrity scanning for deployment trees.
#[derive(Debug, Parser)]
#[command(
    name = "isentry",
    author,
    version,
    about = "Integrity Sentry - parallel checksum scans against a persisted snapshot",
    long_about = None,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Override config file path.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Force JSON output mode.
    #[arg(long, global = true)]
    json: bool,
    /// Disable colored output.
    #[arg(long, global = true)]
    no_color: bool,
    /// Increase verbosity (full path listings).
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,
    /// Quiet mode (findings and errors only).
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Walk the configured roots, diff against the snapshot, persist, notify.
    Scan(ScanArgs),
    /// Show the effective configuration.
    Config(ConfigArgs),
    /// Generate shell completions.
    Completions(CompletionsArgs),
    /// Show version information.
    Version(VersionArgs),
}

#[derive(Debug, Clone, Args, Default)]
struct ScanArgs {
    /// Roots to scan (falls back to configured scan.roots when omitted).
    #[arg(value_name = "PATH")]
    paths: Vec<PathBuf>,
    /// Override the snapshot file path.
    #[arg(long, value_name = "PATH")]
    snapshot: Option<PathBuf>,
    /// Worker-pool size (0 = one worker per processor).
    #[arg(long, default_value_t = 0, value_name = "N")]
    workers: usize,
    /// Compute and report, but skip snapshot persistence and notifications.
    #[arg(long)]
    dry_run: bool,
}

#[derive(Debug, Clone, Args, Default)]
struct ConfigArgs {
    /// Print built-in defaults instead of the loaded configuration.
    #[arg(long)]
    defaults: bool,
}

#[derive(Debug, Clone, Args)]
struct CompletionsArgs {
    /// Target shell.
    #[arg(value_enum)]
    shell: CompletionShell,
}

#[derive(Debug, Clone, Args, Default)]
struct VersionArgs {}

/// Dispatch a parsed command line.
pub fn run(cli: &Cli) -> Result<(), CliError> {
    configure_color(cli);

    match &cli.command {
        Command::Scan(args) => cmd_scan(cli, args),
        Command::Config(args) => cmd_config(cli, args),
        Command::Completions(args) => cmd_completions(args),
        Command::Version(VersionArgs {}) => cmd_version(cli),
    }
}

fn configure_color(cli: &Cli) {
    if cli.no_color || cli.json || !io::stdout().is_terminal() {
        control::set_override(false);
    }
}

fn register_cancel_signals(token: &CancelToken) {
    for signal in [signal_hook::consts::SIGINT, signal_hook::consts::SIGTERM] {
        // Registration failure leaves the scan uncancellable but functional.
        let _ = signal_hook::flag::register(signal, token.as_flag());
    }
}

// ──────────────────── scan ────────────────────

#[allow(clippy::too_many_lines)]
fn cmd_scan(cli: &Cli, args: &ScanArgs) -> Result<(), CliError> {
    let mut config = Config::load(cli.config.as_deref())?;
    if !args.paths.is_empty() {
        config.scan.roots = args.paths.clone();
    }
    if args.workers > 0 {
        config.scan.parallelism = args.workers;
    }
    if let Some(path) = &args.snapshot {
        config.snapshot.path = path.clone();
    }

    if config.scan.roots.is_empty() {
        return Err(SentryError::InvalidConfig {
            details: "no scan roots: set scan.roots in config or pass paths on the command line"
                .to_string(),
        }
        .into());
    }

    let mut logger = config
        .log
        .enabled
        .then(|| JsonlWriter::new(config.log.jsonl_path.clone()));

    let prior = snapshot::load(&config.snapshot.path)?;
    let prior_len = prior.len();

    let engine = ScanEngine::new(ScanOptions::from_config(&config.scan)).with_algorithm(
        Arc::new(ChunkedSha256::with_chunk_size(config.scan.chunk_size)),
    );
    register_cancel_signals(&engine.cancel_token());

    if let Some(logger) = &mut logger {
        let mut entry = LogEntry::new(EventType::ScanStart, Severity::Info);
        entry.roots = Some(config.scan.roots.len());
        entry.snapshot_path = Some(config.snapshot.path.display().to_string());
        entry.config_hash = config.stable_hash().ok();
        entry.details = Some(format!("prior snapshot holds {prior_len} entries"));
        logger.write(&entry);
    }

    let started = Instant::now();
    let report = engine.run(prior)?;
    let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

    print_report(cli, &report, args.dry_run)?;

    if !report.complete {
        if let Some(logger) = &mut logger {
            let mut entry = LogEntry::new(EventType::ScanComplete, Severity::Warning);
            entry.complete = Some(false);
            entry.ok = Some(false);
            entry.files_seen = Some(report.files_seen);
            entry.duration_ms = Some(duration_ms);
            entry.details = Some("cancelled by signal; snapshot left untouched".to_string());
            logger.write(&entry);
        }
        return Err(CliError::Interrupted);
    }

    if !args.dry_run {
        if let Err(err) = snapshot::store(&config.snapshot.path, &report.snapshot) {
            if let Some(logger) = &mut logger {
                let mut entry = LogEntry::new(EventType::Error, Severity::Critical);
                entry.error_code = Some(err.code().to_string());
                entry.error_message = Some(err.to_string());
                entry.snapshot_path = Some(config.snapshot.path.display().to_string());
                logger.write(&entry);
            }
            // Losing the snapshot silently would make every later run
            // re-report the whole tree, so this failure goes out loud.
            let mut notifier = NotificationManager::from_config(&config.notifications);
            notifier.notify(&ScanEvent::ScanFailed {
                code: err.code().to_string(),
                message: err.to_string(),
            });
            return Err(err.into());
        }

        if let Some(logger) = &mut logger {
            let mut entry = LogEntry::new(EventType::SnapshotWritten, Severity::Info);
            entry.snapshot_path = Some(config.snapshot.path.display().to_string());
            entry.files_seen = Some(report.files_seen);
            logger.write(&entry);
        }

        if report.has_findings() {
            let mut notifier = NotificationManager::from_config(&config.notifications);
            let event = ScanEvent::Findings {
                new_files: report.new_files.clone(),
                changed_files: report.changed_files.clone(),
                missing_files: report.missing_files.clone(),
                error_count: report.errors.len(),
            };
            notifier.notify(&event);

            if notifier.is_enabled()
                && notifier.channel_count() > 0
                && let Some(logger) = &mut logger
            {
                let mut entry = LogEntry::new(EventType::NotificationSent, Severity::Info);
                entry.details = Some(notifier.channel_names().join(","));
                logger.write(&entry);
            }
        }
    }

    if let Some(logger) = &mut logger {
        let mut entry = LogEntry::new(EventType::ScanComplete, Severity::Info);
        entry.files_seen = Some(report.files_seen);
        entry.new_files = Some(report.new_files.len());
        entry.changed_files = Some(report.changed_files.len());
        entry.missing_files = Some(report.missing_files.len());
        entry.error_count = Some(report.errors.len());
        entry.complete = Some(true);
        entry.duration_ms = Some(duration_ms);
        entry.ok = Some(true);
        logger.write(&entry);
    }

    // Change detection is reported, never a failure: exit 0 either way.
    Ok(())
}

fn print_report(cli: &Cli, report: &ScanReport, dry_run: bool) -> Result<(), CliError> {
    if cli.json {
        let mut stdout = io::stdout();
        serde_json::to_writer_pretty(&mut stdout, report).map_err(SentryError::from)?;
        writeln!(stdout)?;
        return Ok(());
    }

    let mut out = io::stdout().lock();

    if !cli.quiet {
        let suffix = if dry_run { " (dry run)" } else { "" };
        writeln!(out, "scanned {} files{suffix}", report.files_seen)?;
    }

    if cli.quiet && !report.has_findings() {
        return Ok(());
    }

    print_category(&mut out, "new", &report.new_files, cli.verbose, |s| {
        s.green().to_string()
    })?;
    print_category(&mut out, "changed", &report.changed_files, cli.verbose, |s| {
        s.yellow().to_string()
    })?;
    print_category(&mut out, "missing", &report.missing_files, cli.verbose, |s| {
        s.red().to_string()
    })?;

    if !report.errors.is_empty() {
        let header = format!("{} scan errors:", report.errors.len());
        writeln!(out, "{}", header.as_str().red())?;
        for err in &report.errors {
            writeln!(out, "  {}: {}", err.path, err.reason)?;
        }
    }

    if !report.complete {
        writeln!(
            out,
            "{}",
            "scan interrupted - partial results only".red().bold()
        )?;
    }

    Ok(())
}

/// Print one finding category: count line plus paths (all of them in verbose
/// mode, the first few otherwise).
fn print_category<W: Write>(
    out: &mut W,
    label: &str,
    items: &[String],
    verbose: bool,
    paint: impl Fn(&str) -> String,
) -> io::Result<()> {
    const PREVIEW: usize = 10;

    if items.is_empty() {
        return Ok(());
    }

    writeln!(out, "{}", paint(&format!("{} {label} files:", items.len())))?;
    let shown = if verbose { items.len() } else { PREVIEW.min(items.len()) };
    for item in &items[..shown] {
        writeln!(out, "  {item}")?;
    }
    if shown < items.len() {
        writeln!(out, "  ... and {} more (use --verbose)", items.len() - shown)?;
    }
    Ok(())
}

// ──────────────────── config / completions / version ────────────────────

fn cmd_config(cli: &Cli, args: &ConfigArgs) -> Result<(), CliError> {
    let config = if args.defaults {
        Config::default()
    } else {
        Config::load(cli.config.as_deref())?
    };

    if cli.json {
        let rendered = serde_json::to_string_pretty(&config).map_err(SentryError::from)?;
        println!("{rendered}");
    } else {
        let rendered =
            toml::to_string_pretty(&config).map_err(|err| SentryError::Serialization {
                context: "toml",
                details: err.to_string(),
            })?;
        print!("{rendered}");
    }
    Ok(())
}

fn cmd_completions(args: &CompletionsArgs) -> Result<(), CliError> {
    let mut command = Cli::command();
    generate(args.shell, &mut command, "isentry", &mut io::stdout());
    Ok(())
}

fn cmd_version(cli: &Cli) -> Result<(), CliError> {
    if cli.json {
        println!(
            "{}",
            serde_json::json!({
                "name": "isentry",
                "version": env!("CARGO_PKG_VERSION"),
            })
        );
    } else {
        println!("isentry {}", env!("CARGO_PKG_VERSION"));
    }
    Ok(())
}
