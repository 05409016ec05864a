use std::fs;
use std::path::Path;

use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::paths;

/// Initialize the structured logging system.
///
/// Sets up:
/// - File output: rolling log files in `{data_dir}/logs/daymind.*.log`
///   with daily rotation, keeping the latest 5 files.
/// - Console output (stderr): human-readable format for development.
/// - Environment filter: defaults to `info`, configurable via `RUST_LOG`.
pub fn init(data_dir: &Path) -> anyhow::Result<()> {
    let log_dir = paths::get_log_dir(data_dir);
    fs::create_dir_all(&log_dir)?;

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("daymind")
        .filename_suffix("log")
        .max_log_files(5)
        .build(&log_dir)
        .map_err(|e| anyhow::anyhow!("Failed to create log file appender: {}", e))?;

    let file_layer = fmt::layer()
        .with_writer(file_appender)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true);

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .with_target(true)
        .compact();

    // reqwest/hyper/mio are chatty at info.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,reqwest=warn,hyper=warn,mio=warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Logger already initialized: {}", e))?;

    tracing::info!(log_dir = %log_dir.display(), "Logger initialized");
    Ok(())
}
