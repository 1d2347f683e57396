//! FileWatcher - polls registered log files and queues the ones that grew
//!
//! Client logs are append-only text files, so a strictly newer modification
//! time is the growth signal. Each changed path is sent on a bounded channel
//! to the processor; a full channel suspends the watcher (backpressure).
//!
//! # Registration
//!
//! Only existing, non-empty regular files are watched. Content present at
//! registration is never scanned; only later growth is. A file that was empty
//! when registered is not watched at all and must be registered again.
//!
//! # Lifecycle
//!
//! The watcher runs until:
//! - The `CancellationToken` is triggered
//! - The queue receiver is dropped

use std::{
  collections::HashMap,
  io,
  path::{Path, PathBuf},
  time::{Duration, SystemTime},
};

use tokio::{sync::mpsc, time::MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum RegisterError {
  #[error("Path is a directory: {0}")]
  Directory(PathBuf),

  #[error("File is empty: {0}")]
  Empty(PathBuf),

  #[error("Cannot stat {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

/// Outcome of one scan pass.
enum Scan {
  Continue,
  Stop,
}

// ============================================================================
// FileWatcher
// ============================================================================

pub struct FileWatcher {
  entries: HashMap<PathBuf, SystemTime>,
  tx: mpsc::Sender<PathBuf>,
  poll_interval: Duration,
  cancel: CancellationToken,
}

impl FileWatcher {
  /// `poll_interval` is raised to at least one millisecond.
  pub fn new(tx: mpsc::Sender<PathBuf>, poll_interval: Duration, cancel: CancellationToken) -> Self {
    Self {
      entries: HashMap::new(),
      tx,
      poll_interval: poll_interval.max(Duration::from_millis(1)),
      cancel,
    }
  }

  /// Start watching `path` from its current modification time.
  ///
  /// Registering an already watched path refreshes its recorded mtime.
  pub fn register(&mut self, path: &Path) -> Result<(), RegisterError> {
    let meta = std::fs::metadata(path).map_err(|source| RegisterError::Io {
      path: path.to_path_buf(),
      source,
    })?;

    if meta.is_dir() {
      return Err(RegisterError::Directory(path.to_path_buf()));
    }
    if meta.len() == 0 {
      return Err(RegisterError::Empty(path.to_path_buf()));
    }

    let modified = meta.modified().map_err(|source| RegisterError::Io {
      path: path.to_path_buf(),
      source,
    })?;

    self.entries.insert(path.to_path_buf(), modified);
    info!(path = %path.display(), "Watching log file");
    Ok(())
  }

  pub fn is_watching(&self, path: &Path) -> bool {
    self.entries.contains_key(path)
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  /// Spawn the poll loop onto the runtime
  pub fn spawn(self) -> tokio::task::JoinHandle<()> {
    tokio::spawn(self.run())
  }

  /// Poll until cancelled or the receiver is gone.
  pub async fn run(mut self) {
    info!(files = self.entries.len(), interval_ms = self.poll_interval.as_millis() as u64, "FileWatcher started");

    let mut ticker = tokio::time::interval(self.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
      tokio::select! {
          biased;

          _ = self.cancel.cancelled() => {
              info!("FileWatcher shutting down (cancelled)");
              break;
          }

          _ = ticker.tick() => {
              if let Scan::Stop = self.scan().await {
                  break;
              }
          }
      }
    }

    info!("FileWatcher stopped");
  }

  /// One pass over every entry. Removals are applied after the pass.
  async fn scan(&mut self) -> Scan {
    let mut changed = Vec::new();
    let mut vanished = Vec::new();

    for (path, last_modified) in &self.entries {
      match tokio::fs::metadata(path).await {
        Ok(meta) => match meta.modified() {
          Ok(modified) if modified > *last_modified => changed.push((path.clone(), modified)),
          Ok(_) => {}
          Err(e) => {
            warn!(path = %path.display(), err = %e, "Cannot read modification time, dropping");
            vanished.push(path.clone());
          }
        },
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
          debug!(path = %path.display(), "Log file vanished");
          vanished.push(path.clone());
        }
        Err(e) => {
          warn!(path = %path.display(), err = %e, "Cannot stat log file, dropping");
          vanished.push(path.clone());
        }
      }
    }

    for path in vanished {
      self.entries.remove(&path);
    }

    for (path, modified) in changed {
      self.entries.insert(path.clone(), modified);
      trace!(path = %path.display(), "Log file grew");

      tokio::select! {
          biased;

          _ = self.cancel.cancelled() => return Scan::Stop,

          sent = self.tx.send(path) => {
              if sent.is_err() {
                  info!("FileWatcher shutting down (queue closed)");
                  return Scan::Stop;
              }
          }
      }
    }

    Scan::Continue
  }
}
