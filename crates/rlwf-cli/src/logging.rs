//! Tracing setup
//!
//! Diagnostics go to stderr so that `show` and `env` output can be piped.

use std::path::Path;

use anyhow::{Context, Result};
use rlwf_core::LoggingSection;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

/// Console-only logging for inspection commands
pub fn init(verbose: bool) {
    let log_level = if verbose { "debug" } else { "warn" };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("rlwf={log_level},rlwf_core={log_level}").into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Console and file logging at the thresholds of a workflow `logging` section
///
/// The returned guard flushes the file writer on drop and must be held for
/// the duration of the command.
pub fn init_with_section(
    section: &LoggingSection,
    log_file: &Path,
    verbose: bool,
) -> Result<WorkerGuard> {
    let log_dir = log_file
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let log_filename = log_file
        .file_name()
        .with_context(|| format!("Log path {} has no file name", log_file.display()))?;

    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;

    let file_appender = tracing_appender::rolling::never(log_dir, log_filename);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let stdout_level = if verbose {
        LevelFilter::DEBUG
    } else {
        section.stdout.level_filter()
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(stdout_level),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(non_blocking)
                .with_filter(section.file.level_filter()),
        )
        .init();

    Ok(guard)
}
