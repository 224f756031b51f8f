//! Tracing setup: human-readable stderr plus JSON file logging.

use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Stderr filter directive for the `-v` count and `-q` flag.
pub fn stderr_filter(verbose: u8, quiet: bool) -> &'static str {
    match verbose {
        0 if quiet => "error",
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

/// Directory the JSON log files are written to.
pub fn log_dir() -> PathBuf {
    directories::ProjectDirs::from("dev", "yolotrack", "yolotrack")
        .map(|d| d.data_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Install the global subscriber. `RUST_LOG`, when set, replaces the
/// stderr filter derived from the flags.
///
/// The returned guard flushes the file writer on drop; hold it until the
/// binary exits. When the log directory cannot be written, only the stderr
/// layer is installed and no guard is returned.
pub fn init(verbose: u8, quiet: bool, file_name: &str) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(stderr_filter(verbose, quiet)));
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(filter);

    let log_dir = log_dir();
    let _ = std::fs::create_dir_all(&log_dir);
    let (json_layer, guard) = match RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(file_name)
        .build(&log_dir)
    {
        Ok(file_appender) => {
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let layer = tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(EnvFilter::new("debug"));
            (Some(layer), Some(guard))
        }
        Err(_) => (None, None),
    };

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    guard
}
