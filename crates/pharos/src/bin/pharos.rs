use clap::{Arg, Command};
use pharos::bridge::{FileStore, LocalStore};
use pharos::config::Mode;
use pharos::error::PharosError;
use pharos::score::{LighthouseExport, performance_score};
use pharos::telemetry::{LOGS_KEY, LogEntry, LogEvent, LogExport, LogLevel};
use pharos::vitals::{MetricSample, Unit};
use rustc_hash::FxHashMap;

use tracing::error;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let matches = Command::new("pharos")
        .version(env!("CARGO_PKG_VERSION"))
        .about("pharos instrumentation toolkit")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("score")
                .about("Recompute Lighthouse-style scores from an exported metrics file")
                .arg(
                    Arg::new("file")
                        .value_name("FILE")
                        .help("Export produced by export_lighthouse_data")
                        .required(true),
                ),
        )
        .subcommand(
            Command::new("logs").about("Summarize an exported log bundle").arg(
                Arg::new("file")
                    .value_name("FILE")
                    .help("Export produced by export_logs, or a store file holding app_logs")
                    .required(true),
            ),
        )
        .arg(
            Arg::new("mode")
                .short('m')
                .long("mode")
                .value_name("MODE")
                .help("Session mode assumed when the input does not carry one")
                .value_parser(["development", "dev", "production", "prod"])
                .default_value("development")
                .global(true),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging")
                .action(clap::ArgAction::SetTrue)
                .global(true),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .help("Reduce log output")
                .action(clap::ArgAction::SetTrue)
                .global(true),
        )
        .get_matches();

    init_logging(&matches)?;

    let mode = parse_mode(&matches)?;

    match matches.subcommand() {
        Some(("score", sub_matches)) => {
            run_score(sub_matches).map_err(|e| {
                error!("score failed: {}", e);
                e
            })?;
        }
        Some(("logs", sub_matches)) => {
            run_logs(sub_matches, mode).map_err(|e| {
                error!("logs failed: {}", e);
                e
            })?;
        }
        _ => {}
    }

    Ok(())
}

#[allow(clippy::result_large_err)]
fn init_logging(matches: &clap::ArgMatches) -> Result<(), PharosError> {
    let verbose = matches.get_flag("verbose");
    let quiet = matches.get_flag("quiet");

    let default_level = if verbose {
        "debug"
    } else if quiet {
        "warn"
    } else {
        "info"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(format!("pharos={default_level}")))
        .map_err(|e| PharosError::validation(format!("Failed to create log filter: {e}")))?;

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false)
                .with_file(verbose)
                .with_line_number(verbose)
                .compact(),
        )
        .init();

    Ok(())
}

#[allow(clippy::result_large_err)]
fn parse_mode(matches: &clap::ArgMatches) -> Result<Mode, PharosError> {
    let mode_str = matches
        .get_one::<String>("mode")
        .ok_or_else(|| PharosError::validation("Mode argument is required".to_string()))?;

    match mode_str.as_str() {
        "development" | "dev" => Ok(Mode::Development),
        "production" | "prod" => Ok(Mode::Production),
        mode => Err(PharosError::validation(format!("Invalid mode: {mode}"))),
    }
}

#[allow(clippy::result_large_err)]
fn required_file(matches: &clap::ArgMatches) -> Result<String, PharosError> {
    matches
        .get_one::<String>("file")
        .cloned()
        .ok_or_else(|| PharosError::validation("FILE argument is required".to_string()))
}

#[allow(clippy::result_large_err)]
fn run_score(matches: &clap::ArgMatches) -> Result<(), PharosError> {
    let path = required_file(matches)?;
    let contents = std::fs::read_to_string(&path)?;
    let export: LighthouseExport = serde_json::from_str(&contents)
        .map_err(|e| PharosError::deserialization(format!("{path} is not a metrics export: {e}")))?;

    println!("{}", export.url);
    println!("collected {} by {}", export.timestamp.to_rfc3339(), export.user_agent);
    println!();
    println!("  {:<8} {:>12}  rating", "metric", "value");
    for sample in &export.metrics {
        println!("  {:<8} {:>12}  {}", sample.name, format_value(sample), sample.rating);
    }

    let recomputed = performance_score(&export.metrics);
    println!();
    print_category("performance", recomputed);
    if recomputed != export.scores.performance {
        println!("  (stored performance was {})", format_score(export.scores.performance));
    }
    print_category("accessibility", export.scores.accessibility);
    print_category("best practices", export.scores.best_practices);
    print_category("seo", export.scores.seo);

    Ok(())
}

#[allow(clippy::result_large_err)]
fn run_logs(matches: &clap::ArgMatches, assumed_mode: Mode) -> Result<(), PharosError> {
    let path = required_file(matches)?;
    let contents = std::fs::read_to_string(&path)?;

    match serde_json::from_str::<LogExport>(&contents) {
        Ok(export) => print_log_export(&export),
        Err(_) => {
            // Not an export bundle; read the persisted slice out of a store file.
            let store = FileStore::open(&path)?;
            let raw = store
                .get(LOGS_KEY)?
                .ok_or_else(|| PharosError::not_found(format!("{path} has no {LOGS_KEY} entry")))?;
            let entries: Vec<LogEntry> = serde_json::from_str(&raw).map_err(|e| {
                PharosError::deserialization(format!("{path} holds a corrupt {LOGS_KEY} table: {e}"))
            })?;

            println!("store file, assuming {assumed_mode} mode");
            println!("saved {}", entries.len());
            print_entry_breakdown(&entries);
        }
    }

    Ok(())
}

fn print_log_export(export: &LogExport) {
    println!(
        "session {} ({}) started {}",
        export.session.id,
        export.session.mode,
        export.session.started_at.to_rfc3339()
    );
    println!("buffered {}, saved {}", export.buffer.len(), export.saved.len());

    if let Some(snapshot) = &export.performance {
        match (snapshot.used_heap_bytes, snapshot.total_heap_bytes) {
            (Some(used), Some(total)) => println!(
                "heap {:.1} MB used of {:.1} MB, {:.0} ms since start",
                used as f64 / (1024.0 * 1024.0),
                total as f64 / (1024.0 * 1024.0),
                snapshot.elapsed_ms
            ),
            _ => println!("{:.0} ms since start", snapshot.elapsed_ms),
        }
    }

    print_entry_breakdown(&export.buffer);
}

fn print_entry_breakdown(entries: &[LogEntry]) {
    const LEVELS: [LogLevel; 4] =
        [LogLevel::Error, LogLevel::Warn, LogLevel::Info, LogLevel::Debug];

    println!();
    for level in LEVELS {
        let count = entries.iter().filter(|e| e.level == level).count();
        if count > 0 {
            println!("  {:<6} {count}", level.as_str());
        }
    }

    let mut kinds: FxHashMap<&'static str, usize> = FxHashMap::default();
    for entry in entries {
        if let Some(event) = &entry.event {
            *kinds.entry(event_kind(event)).or_default() += 1;
        }
    }

    if !kinds.is_empty() {
        let mut kinds: Vec<_> = kinds.into_iter().collect();
        kinds.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
        println!();
        for (kind, count) in kinds {
            println!("  {kind:<15} {count}");
        }
    }

    if let Some(last_error) = entries.iter().rev().find(|e| e.level == LogLevel::Error) {
        println!();
        println!("  last error: {}", last_error.message);
    }
}

fn event_kind(event: &LogEvent) -> &'static str {
    match event {
        LogEvent::UserAction { .. } => "user_action",
        LogEvent::ApiCall { .. } => "api_call",
        LogEvent::PageView { .. } => "page_view",
        LogEvent::FeatureUsage { .. } => "feature_usage",
        LogEvent::RuntimeError { .. } => "runtime_error",
        LogEvent::ResourceError { .. } => "resource_error",
        LogEvent::Custom { .. } => "custom",
    }
}

fn format_value(sample: &MetricSample) -> String {
    match sample.unit {
        Unit::Ms => format!("{:.0} ms", sample.value),
        Unit::Score => format!("{:.3}", sample.value),
        Unit::None => format!("{}", sample.value),
    }
}

fn format_score(score: Option<u8>) -> String {
    match score {
        Some(value) => value.to_string(),
        None => "-".to_string(),
    }
}

fn print_category(label: &str, score: Option<u8>) {
    println!("  {label:<15} {}", format_score(score));
}
