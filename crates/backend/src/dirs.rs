use std::path::{Path, PathBuf};

use tracing::debug;

/// Get the default base path for avtrlog data
///
/// Respects the following environment variables (in order of precedence):
/// 1. DATA_DIR - explicit data directory override
/// 2. XDG_DATA_HOME - standard XDG data home directory
/// 3. dirs::data_local_dir() - platform default
pub fn default_data_dir() -> PathBuf {
  // Check explicit override first
  if let Ok(dir) = std::env::var("DATA_DIR") {
    return PathBuf::from(dir);
  }

  // Check XDG_DATA_HOME
  if let Ok(xdg_data) = std::env::var("XDG_DATA_HOME") {
    return PathBuf::from(xdg_data).join("avtrlog");
  }

  // Fall back to platform default
  dirs::data_local_dir()
    .unwrap_or_else(|| PathBuf::from("."))
    .join("avtrlog")
}

/// Newest `output_log_*.txt` in a client log directory, by modification time.
pub fn latest_log_file(dir: &Path) -> Option<PathBuf> {
  let entries = match std::fs::read_dir(dir) {
    Ok(entries) => entries,
    Err(e) => {
      debug!(dir = %dir.display(), err = %e, "Cannot list log directory");
      return None;
    }
  };

  entries
    .flatten()
    .filter(|entry| {
      entry
        .file_name()
        .to_str()
        .is_some_and(|name| name.starts_with("output_log_") && name.ends_with(".txt"))
    })
    .filter_map(|entry| {
      let modified = entry.metadata().and_then(|m| m.modified()).ok()?;
      Some((modified, entry.path()))
    })
    .max_by_key(|(modified, _)| *modified)
    .map(|(_, path)| path)
}
