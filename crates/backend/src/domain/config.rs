//! Configuration for avtrlog.
//!
//! Config priority: explicit `--config` path > user (~/.config/avtrlog/config.toml) > defaults

use std::{
  path::{Path, PathBuf},
  time::Duration,
};

use serde::{Deserialize, Serialize};
use tracing::warn;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
  #[error("`{0}` must be greater than zero")]
  ZeroInterval(&'static str),
}

// ============================================================================
// Watcher Configuration
// ============================================================================

/// Log file polling settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatcherConfig {
  /// Poll period in milliseconds (default: 1000)
  pub poll_interval_ms: u64,

  /// Capacity of the changed-file queue between watcher and processor (default: 64)
  /// The watcher waits when the queue is full instead of dropping paths.
  pub queue_capacity: usize,

  /// Files or directories to watch.
  /// A directory resolves to its newest `output_log_*.txt`.
  pub paths: Vec<PathBuf>,
}

impl Default for WatcherConfig {
  fn default() -> Self {
    Self {
      poll_interval_ms: 1000,
      queue_capacity: 64,
      paths: Vec::new(),
    }
  }
}

impl WatcherConfig {
  pub fn poll_interval(&self) -> Duration {
    Duration::from_millis(self.poll_interval_ms)
  }
}

// ============================================================================
// Cache Configuration
// ============================================================================

/// Seen-avatar cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  /// Days before a seen avatar is announced again (default: 30)
  pub retention_days: u32,

  /// Number of pooled SQLite connections (default: 5)
  pub pool_size: u32,

  /// Database file override (default: <data dir>/avatars.sqlite)
  #[serde(skip_serializing_if = "Option::is_none")]
  pub path: Option<PathBuf>,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      retention_days: 30,
      pool_size: 5,
      path: None,
    }
  }
}

impl CacheConfig {
  pub fn retention(&self) -> Duration {
    Duration::from_secs(u64::from(self.retention_days) * 24 * 3600)
  }

  pub fn database_path(&self) -> PathBuf {
    self
      .path
      .clone()
      .unwrap_or_else(|| crate::dirs::default_data_dir().join("avatars.sqlite"))
  }
}

// ============================================================================
// Upload Configuration
// ============================================================================

/// Upload target settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
  /// Send newly seen avatars to the configured targets (default: true)
  pub enabled: bool,

  /// Targets in submission order: AVTRDB, PAW, VRCWB
  pub targets: Vec<String>,

  /// Name reported to targets that accept an attribution field
  pub attribution: String,

  /// Per-request timeout in seconds (default: 5)
  pub request_timeout_secs: u64,
}

impl Default for UploadConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      targets: vec!["AVTRDB".to_string(), "PAW".to_string(), "VRCWB".to_string()],
      attribution: "avtrlog".to_string(),
      request_timeout_secs: 5,
    }
  }
}

impl UploadConfig {
  pub fn request_timeout(&self) -> Duration {
    Duration::from_secs(self.request_timeout_secs)
  }
}

// ============================================================================
// Status Configuration
// ============================================================================

/// Presence refresh settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusConfig {
  /// Seconds between presence refreshes (default: 20)
  pub refresh_interval_secs: u64,

  /// Timeout for avatar metadata lookups in seconds (default: 5)
  pub metadata_timeout_secs: u64,
}

impl Default for StatusConfig {
  fn default() -> Self {
    Self {
      refresh_interval_secs: 20,
      metadata_timeout_secs: 5,
    }
  }
}

impl StatusConfig {
  pub fn refresh_interval(&self) -> Duration {
    Duration::from_secs(self.refresh_interval_secs)
  }

  pub fn metadata_timeout(&self) -> Duration {
    Duration::from_secs(self.metadata_timeout_secs)
  }
}

// ============================================================================
// Log Configuration
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
  /// Log level: "error", "warn", "info", "debug", "trace"
  pub level: String,

  /// Log file rotation when logging to a file: "daily", "hourly", "never"
  pub rotation: String,
}

impl Default for LogConfig {
  fn default() -> Self {
    Self {
      level: "info".to_string(),
      rotation: "daily".to_string(),
    }
  }
}

// ============================================================================
// Main Configuration
// ============================================================================

/// avtrlog configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
  #[serde(default)]
  pub watcher: WatcherConfig,

  #[serde(default)]
  pub cache: CacheConfig,

  #[serde(default)]
  pub upload: UploadConfig,

  #[serde(default)]
  pub status: StatusConfig,

  #[serde(default)]
  pub log: LogConfig,
}

impl Config {
  /// Load config from an explicit path, falling back to the user config, then defaults.
  ///
  /// A file that exists but fails to parse is reported and skipped.
  pub fn load(explicit: Option<&Path>) -> Self {
    if let Some(path) = explicit {
      if let Some(config) = Self::read_file(path) {
        return config;
      }
      warn!(path = %path.display(), "Config file unusable, falling back to user config");
    }

    if let Some(user_config_path) = Self::user_config_path()
      && user_config_path.exists()
      && let Some(config) = Self::read_file(&user_config_path)
    {
      return config;
    }

    Self::default()
  }

  fn read_file(path: &Path) -> Option<Self> {
    let content = match std::fs::read_to_string(path) {
      Ok(content) => content,
      Err(e) => {
        warn!(path = %path.display(), err = %e, "Failed to read config file");
        return None;
      }
    };

    match toml::from_str(&content) {
      Ok(config) => Some(config),
      Err(e) => {
        warn!(path = %path.display(), err = %e, "Failed to parse config file");
        None
      }
    }
  }

  /// Get the user-level config path
  pub fn user_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("CONFIG_DIR") {
      return Some(PathBuf::from(path).join("config.toml"));
    }

    if let Ok(path) = std::env::var("XDG_CONFIG_HOME") {
      return Some(PathBuf::from(path).join("avtrlog").join("config.toml"));
    }

    dirs::config_dir().map(|p: PathBuf| p.join("avtrlog").join("config.toml"))
  }

  /// Reject settings the daemon cannot run with.
  pub fn validate(&self) -> Result<(), ConfigError> {
    if self.watcher.poll_interval_ms == 0 {
      return Err(ConfigError::ZeroInterval("watcher.poll_interval_ms"));
    }
    if self.status.refresh_interval_secs == 0 {
      return Err(ConfigError::ZeroInterval("status.refresh_interval_secs"));
    }
    Ok(())
  }

  /// Generate a default config file as a string
  pub fn generate_template() -> String {
    let defaults = Self::default();
    let targets = defaults
      .upload
      .targets
      .iter()
      .map(|t| format!("\"{}\"", t))
      .collect::<Vec<_>>()
      .join(", ");

    format!(
      r#"# avtrlog configuration
# Place in ~/.config/avtrlog/config.toml or pass --config <file>

# ============================================================================
# Watcher
# ============================================================================

[watcher]
# How often watched files are checked for growth (milliseconds)
poll_interval_ms = {poll}

# Changed files waiting for processing before the watcher pauses
queue_capacity = {queue}

# Files or directories to watch. A directory resolves to its newest
# output_log_*.txt. Paths given on the command line replace these.
paths = []

# ============================================================================
# Seen-avatar cache
# ============================================================================

[cache]
# Days before an avatar seen again is re-uploaded
retention_days = {retention}

# Pooled database connections
pool_size = {pool}

# Database location (default: <data dir>/avatars.sqlite)
# path = "/path/to/avatars.sqlite"

# ============================================================================
# Uploads
# ============================================================================

[upload]
enabled = {enabled}

# Available targets: AVTRDB, PAW, VRCWB
targets = [{targets}]

# Attribution sent to targets that accept one
attribution = "{attribution}"

request_timeout_secs = {timeout}

# ============================================================================
# Presence status
# ============================================================================

[status]
refresh_interval_secs = {refresh}
metadata_timeout_secs = {metadata_timeout}

# ============================================================================
# Logging
# ============================================================================

[log]
# error, warn, info, debug, trace (RUST_LOG overrides)
level = "{level}"

# Rotation for --log-file: daily, hourly, never
rotation = "{rotation}"
"#,
      poll = defaults.watcher.poll_interval_ms,
      queue = defaults.watcher.queue_capacity,
      retention = defaults.cache.retention_days,
      pool = defaults.cache.pool_size,
      enabled = defaults.upload.enabled,
      targets = targets,
      attribution = defaults.upload.attribution,
      timeout = defaults.upload.request_timeout_secs,
      refresh = defaults.status.refresh_interval_secs,
      metadata_timeout = defaults.status.metadata_timeout_secs,
      level = defaults.log.level,
      rotation = defaults.log.rotation,
    )
  }
}
