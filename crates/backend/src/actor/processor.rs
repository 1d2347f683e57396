//! Processor - consumes changed log paths and announces new avatars
//!
//! For every queued path:
//! 1. Extract identifiers from the whole file
//! 2. Skip those already handled this session
//! 3. Ask the dedup cache whether the avatar is new
//! 4. Upload new avatars to every target
//! 5. Confirm the avatar in [`RunState`] when any target accepted it
//!
//! On cancellation the queue is closed and every path already in it is still
//! processed before the task exits.

use std::{collections::HashSet, path::PathBuf, sync::Arc};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::state::RunState;
use crate::{
  db::DedupCache,
  domain::identifier::Identifier,
  extract::extract,
  presence::{self, PresenceSink, STATUS_PROCESSING, STATUS_WATCHING},
  upload::UploadDispatcher,
};

pub struct Processor {
  rx: mpsc::Receiver<PathBuf>,
  cache: DedupCache,
  dispatcher: Arc<UploadDispatcher>,
  presence: Arc<dyn PresenceSink>,
  state: Arc<RunState>,
  cancel: CancellationToken,
  /// Identifiers already handled by this process
  seen: HashSet<Identifier>,
}

impl Processor {
  pub fn new(
    rx: mpsc::Receiver<PathBuf>,
    cache: DedupCache,
    dispatcher: Arc<UploadDispatcher>,
    presence: Arc<dyn PresenceSink>,
    state: Arc<RunState>,
    cancel: CancellationToken,
  ) -> Self {
    Self {
      rx,
      cache,
      dispatcher,
      presence,
      state,
      cancel,
      seen: HashSet::new(),
    }
  }

  pub fn spawn(self) -> tokio::task::JoinHandle<()> {
    tokio::spawn(self.run())
  }

  pub async fn run(mut self) {
    info!(targets = self.dispatcher.len(), "Processor started");

    loop {
      tokio::select! {
          biased;

          _ = self.cancel.cancelled() => {
              info!("Processor shutting down (cancelled)");
              break;
          }

          path = self.rx.recv() => {
              match path {
                  Some(path) => self.process_path(path).await,
                  None => {
                      info!("Processor shutting down (queue closed)");
                      break;
                  }
              }
          }
      }
    }

    // Drain whatever the watcher already queued
    self.rx.close();
    let mut drained = 0usize;
    while let Some(path) = self.rx.recv().await {
      self.process_path(path).await;
      drained += 1;
    }
    if drained > 0 {
      debug!(drained, "Drained queued paths on shutdown");
    }

    info!(processed = self.seen.len(), "Processor stopped");
  }

  async fn process_path(&mut self, path: PathBuf) {
    let mut ids: Vec<Identifier> = extract(&path).await.into_iter().collect();
    ids.sort();

    if !ids.is_empty() {
      debug!(path = %path.display(), found = ids.len(), "Extracted identifiers");
      presence::announce(self.presence.as_ref(), STATUS_PROCESSING).await;
    }

    for id in ids {
      if self.seen.contains(&id) {
        continue;
      }
      if !self.cache.observe(&id).await {
        continue;
      }

      info!(avatar_id = %id, link = %id.vrcx_link(), "New avatar");
      self.seen.insert(id.clone());

      let report = self.dispatcher.dispatch(&id).await;
      if report.any_success() {
        self.state.confirm(id).await;
      }
    }

    if self.rx.is_empty() {
      presence::announce(self.presence.as_ref(), STATUS_WATCHING).await;
    }
  }
}
