//! Daemon lifecycle management.
//!
//! The daemon wires the watcher, the processor and the status refresher
//! together and supervises them until shutdown.
//!
//! # Architecture
//!
//! ```text
//! Daemon (Supervisor)
//!   ├── FileWatcher ──(bounded queue)──> Processor
//!   │                                      ├── DedupCache
//!   │                                      └── UploadDispatcher
//!   └── StatusRefresher ── PresenceSink
//! ```
//!
//! # Lifecycle
//!
//! 1. Validate the config and open the dedup cache (both fatal on error), then
//!    prune expired rows
//! 2. Connect the presence sink and announce startup
//! 3. Build upload targets and the metadata source
//! 4. Create the bounded queue and register log files
//! 5. Spawn the three tasks under child tokens of one master token
//! 6. On cancellation: wait for the tasks (the processor drains first), then
//!    close the presence sink and the cache

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use chrono::Utc;
use tokio::{signal, sync::mpsc, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::{
  actor::{FileWatcher, Processor, RunState, StatusRefresher},
  db::{DbError, DedupCache},
  dirs,
  domain::config::{Config, ConfigError},
  metadata::{MetadataError, MetadataSource, PawMetadata},
  presence::{self, LogPresence, PresenceSink, STATUS_STARTING},
  upload::{HttpPoster, ReqwestPoster, TransportError, UploadDispatcher, build_targets},
};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum DaemonError {
  #[error("Invalid configuration: {0}")]
  Config(#[from] ConfigError),

  #[error("Failed to open avatar cache: {0}")]
  Cache(#[from] DbError),

  #[error("Failed to build HTTP client: {0}")]
  Http(#[from] TransportError),

  #[error("Failed to build metadata client: {0}")]
  Metadata(#[from] MetadataError),
}

// ============================================================================
// Daemon
// ============================================================================

/// The avtrlog daemon.
///
/// Collaborators default to the shipped implementations ([`LogPresence`],
/// [`PawMetadata`], [`ReqwestPoster`]) and can be swapped before [`run`].
///
/// [`run`]: Daemon::run
pub struct Daemon {
  config: Config,
  presence: Arc<dyn PresenceSink>,
  metadata: Option<Arc<dyn MetadataSource>>,
  poster: Option<Arc<dyn HttpPoster>>,
}

impl Daemon {
  pub fn new(config: Config) -> Self {
    Self {
      config,
      presence: Arc::new(LogPresence::new()),
      metadata: None,
      poster: None,
    }
  }

  pub fn with_presence(mut self, presence: Arc<dyn PresenceSink>) -> Self {
    self.presence = presence;
    self
  }

  pub fn with_metadata(mut self, metadata: Arc<dyn MetadataSource>) -> Self {
    self.metadata = Some(metadata);
    self
  }

  pub fn with_poster(mut self, poster: Arc<dyn HttpPoster>) -> Self {
    self.poster = Some(poster);
    self
  }

  /// Run until ctrl-c.
  pub async fn run(self) -> Result<(), DaemonError> {
    let cancel = CancellationToken::new();

    let cancel_for_signal = cancel.clone();
    tokio::spawn(async move {
      if let Err(e) = signal::ctrl_c().await {
        warn!(err = %e, "Failed to listen for ctrl-c");
        return;
      }
      info!("Received ctrl-c, shutting down...");
      cancel_for_signal.cancel();
    });

    self.run_until(cancel).await
  }

  /// Run until `cancel` fires.
  pub async fn run_until(self, cancel: CancellationToken) -> Result<(), DaemonError> {
    info!(version = env!("CARGO_PKG_VERSION"), "Starting avtrlog daemon");

    if let Err(e) = self.config.validate() {
      error!(err = %e, "Invalid configuration");
      return Err(e.into());
    }

    let cache_path = self.config.cache.database_path();
    let cache = match DedupCache::open(&cache_path, &self.config.cache).await {
      Ok(cache) => cache,
      Err(e) => {
        error!(path = %cache_path.display(), err = %e, "Cannot open avatar cache");
        return Err(e.into());
      }
    };

    if let Err(e) = cache.prune_expired(Utc::now().timestamp()).await {
      warn!(err = %e, "Failed to prune expired avatars");
    }

    if let Err(e) = self.presence.connect().await {
      warn!(err = %e, "Presence unavailable, continuing without it");
    }
    presence::announce(self.presence.as_ref(), STATUS_STARTING).await;

    let poster = match self.poster {
      Some(poster) => poster,
      None => Arc::new(ReqwestPoster::new(self.config.upload.request_timeout())?),
    };
    let metadata = match self.metadata {
      Some(metadata) => metadata,
      None => Arc::new(PawMetadata::new(self.config.status.metadata_timeout())?),
    };

    let targets = build_targets(&self.config.upload, poster, &cancel.child_token());
    info!(targets = targets.len(), "Upload targets ready");
    let dispatcher = Arc::new(UploadDispatcher::new(targets));

    let state = Arc::new(RunState::new());
    let (tx, rx) = mpsc::channel(self.config.watcher.queue_capacity.max(1));

    let mut watcher = FileWatcher::new(tx, self.config.watcher.poll_interval(), cancel.child_token());
    for path in resolve_log_paths(&self.config.watcher.paths) {
      if let Err(e) = watcher.register(&path) {
        warn!(err = %e, "Skipping log file");
      }
    }
    if watcher.is_empty() {
      warn!("No log files registered, nothing will be observed");
    }

    let watcher_handle = watcher.spawn();
    let status_handle = StatusRefresher::new(
      Arc::clone(&state),
      Arc::clone(&self.presence),
      metadata,
      &self.config.status,
      cancel.child_token(),
    )
    .spawn();
    let processor_handle = Processor::new(
      rx,
      cache.clone(),
      dispatcher,
      Arc::clone(&self.presence),
      state,
      cancel.child_token(),
    )
    .spawn();

    cancel.cancelled().await;
    info!("Shutting down...");

    join_task("FileWatcher", watcher_handle).await;
    join_task("Processor", processor_handle).await;
    join_task("StatusRefresher", status_handle).await;

    self.presence.close().await;
    cache.close().await;

    info!("Daemon shutdown complete");
    Ok(())
  }
}

async fn join_task(name: &'static str, handle: JoinHandle<()>) {
  match handle.await {
    Ok(()) => {}
    Err(e) if e.is_panic() => error!(task = name, err = %e, "Task panicked"),
    Err(e) => warn!(task = name, err = %e, "Task did not finish cleanly"),
  }
}

/// Expand configured paths into log files to watch. A directory stands for
/// its newest `output_log_*.txt`.
pub fn resolve_log_paths(paths: &[PathBuf]) -> Vec<PathBuf> {
  paths
    .iter()
    .filter_map(|path| resolve_one(path))
    .collect()
}

fn resolve_one(path: &Path) -> Option<PathBuf> {
  if !path.is_dir() {
    return Some(path.to_path_buf());
  }
  let latest = dirs::latest_log_file(path);
  if latest.is_none() {
    warn!(dir = %path.display(), "No output_log_*.txt in directory");
  }
  latest
}
