//! Logging setup for CLI commands and the daemon

use std::path::PathBuf;

use avtrlog::config::LogConfig;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Directory holding rolled log files
pub fn log_dir() -> PathBuf {
  avtrlog::dirs::default_data_dir().join("logs")
}

/// Initialize logging for short-lived commands (console only)
pub fn init_cli_logging() {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into()))
    .init();
}

/// Parse log level from config string
fn parse_log_level(level: &str) -> tracing::Level {
  match level.to_lowercase().as_str() {
    "off" | "error" => tracing::Level::ERROR,
    "warn" => tracing::Level::WARN,
    "info" => tracing::Level::INFO,
    "debug" => tracing::Level::DEBUG,
    "trace" => tracing::Level::TRACE,
    _ => tracing::Level::INFO,
  }
}

/// Initialize logging for the daemon from the `[log]` config section.
///
/// Without `to_file`: console with colors.
/// With `to_file`: rolling file in [`log_dir`] (no ANSI).
///
/// Returns the guard that must be kept alive for the duration of the program
pub fn init_daemon_logging(config: &LogConfig, to_file: bool) -> Option<WorkerGuard> {
  let level = parse_log_level(&config.level);

  // RUST_LOG still overrides
  let env_filter = EnvFilter::builder()
    .with_default_directive(level.into())
    .from_env_lossy();

  if !to_file {
    tracing_subscriber::fmt()
      .with_env_filter(env_filter)
      .with_target(false)
      .with_ansi(true)
      .init();
    return None;
  }

  let dir = log_dir();
  if std::fs::create_dir_all(&dir).is_err() {
    // Fall back to console-only logging
    init_cli_logging();
    return None;
  }

  let file_appender = match config.rotation.as_str() {
    "hourly" => tracing_appender::rolling::hourly(&dir, "avtrlog.log"),
    "never" => tracing_appender::rolling::never(&dir, "avtrlog.log"),
    _ => tracing_appender::rolling::daily(&dir, "avtrlog.log"),
  };

  let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

  tracing_subscriber::fmt()
    .with_env_filter(env_filter)
    .with_target(true)
    .with_ansi(false)
    .with_writer(file_writer)
    .init();

  Some(guard)
}
