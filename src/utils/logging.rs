use std::fs;
use std::path::Path;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::filter::{LevelFilter, Targets};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

pub const TIMING_TARGET: &str = "barber.timing";

/// Flushes the rolling writers when dropped; hold it for the whole process.
pub struct LoggingGuards {
    _guards: Vec<WorkerGuard>,
}

pub fn parse_log_level(value: &str) -> LevelFilter {
    match value.trim().to_lowercase().as_str() {
        "trace" => LevelFilter::TRACE,
        "debug" => LevelFilter::DEBUG,
        "info" => LevelFilter::INFO,
        "warn" | "warning" => LevelFilter::WARN,
        "error" => LevelFilter::ERROR,
        "off" => LevelFilter::OFF,
        _ => LevelFilter::INFO,
    }
}

fn application_targets(level: LevelFilter) -> Targets {
    Targets::new()
        .with_default(level)
        .with_target(TIMING_TARGET, LevelFilter::OFF)
        .with_target("hyper", LevelFilter::WARN)
        .with_target("hyper_util", LevelFilter::WARN)
        .with_target("reqwest", LevelFilter::WARN)
}

fn timing_targets() -> Targets {
    Targets::new()
        .with_default(LevelFilter::OFF)
        .with_target(TIMING_TARGET, LevelFilter::INFO)
}

fn rolling_writer(
    logs_dir: &Path,
    file_name: &str,
    guards: &mut Vec<WorkerGuard>,
) -> NonBlocking {
    let appender = tracing_appender::rolling::daily(logs_dir, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    guards.push(guard);
    writer
}

/// Application events go to `barber.log`/`barber.jsonl`, timing events to
/// `timing.log`/`timing.jsonl`. The terminal only sees warnings and errors so
/// command output stays readable.
pub fn init_logging(log_level: &str, logs_dir: &Path) -> LoggingGuards {
    if let Err(err) = fs::create_dir_all(logs_dir) {
        eprintln!("Failed to create logs directory {}: {err}", logs_dir.display());
    }

    let level = parse_log_level(log_level);
    let mut guards = Vec::with_capacity(4);

    let app_plain = tracing_subscriber::fmt::layer()
        .with_writer(rolling_writer(logs_dir, "barber.log", &mut guards))
        .with_ansi(false)
        .with_filter(application_targets(level));
    let app_json = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(rolling_writer(logs_dir, "barber.jsonl", &mut guards))
        .with_filter(application_targets(level));
    let timing_plain = tracing_subscriber::fmt::layer()
        .with_writer(rolling_writer(logs_dir, "timing.log", &mut guards))
        .with_ansi(false)
        .with_filter(timing_targets());
    let timing_json = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(rolling_writer(logs_dir, "timing.jsonl", &mut guards))
        .with_filter(timing_targets());
    let console = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(application_targets(level.min(LevelFilter::WARN)));

    tracing_subscriber::registry()
        .with(app_plain)
        .with(app_json)
        .with(timing_plain)
        .with(timing_json)
        .with(console)
        .init();

    LoggingGuards { _guards: guards }
}
