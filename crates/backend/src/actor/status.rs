//! StatusRefresher - keeps the presence display in sync with the last upload
//!
//! Every tick shows either the detailed status of the most recently confirmed
//! avatar or the generic "Watching for logs" status. Metadata is fetched once
//! per confirmed avatar and cached in [`RunState`].

use std::{sync::Arc, time::Duration};

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::state::RunState;
use crate::{
  domain::{config::StatusConfig, identifier::Identifier},
  metadata::{AvatarMetadata, MetadataSource},
  presence::{self, DetailedStatus, PresenceSink, STATUS_WATCHING},
};

pub struct StatusRefresher {
  state: Arc<RunState>,
  presence: Arc<dyn PresenceSink>,
  metadata: Arc<dyn MetadataSource>,
  interval: Duration,
  metadata_timeout: Duration,
  cancel: CancellationToken,
}

impl StatusRefresher {
  pub fn new(
    state: Arc<RunState>,
    presence: Arc<dyn PresenceSink>,
    metadata: Arc<dyn MetadataSource>,
    config: &StatusConfig,
    cancel: CancellationToken,
  ) -> Self {
    Self {
      state,
      presence,
      metadata,
      interval: config.refresh_interval().max(Duration::from_secs(1)),
      metadata_timeout: config.metadata_timeout(),
      cancel,
    }
  }

  pub fn spawn(self) -> tokio::task::JoinHandle<()> {
    tokio::spawn(self.run())
  }

  pub async fn run(self) {
    info!(interval_secs = self.interval.as_secs(), "StatusRefresher started");

    let mut ticker = tokio::time::interval(self.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    // Skip the immediate tick
    ticker.tick().await;

    loop {
      tokio::select! {
          biased;

          _ = self.cancel.cancelled() => break,

          _ = ticker.tick() => self.refresh().await,
      }
    }

    info!("StatusRefresher stopped");
  }

  /// One refresh step.
  pub async fn refresh(&self) {
    if !self.presence.is_connected() {
      debug!("Skipping status refresh, presence not connected");
      return;
    }

    if let Some(latest) = self.state.latest().await {
      if let Some(metadata) = self.metadata_for(&latest).await {
        let status = DetailedStatus::new(
          &metadata.name,
          &metadata.author_name,
          &metadata.description,
          metadata.image_url.as_deref(),
        );
        if let Err(e) = self.presence.push_detailed_status(&status).await {
          warn!(avatar_id = %latest, err = %e, "Detailed status update failed, marking disconnected");
          self.presence.mark_disconnected();
        }
        return;
      }
    }

    presence::announce(self.presence.as_ref(), STATUS_WATCHING).await;
  }

  /// Cached metadata, refetched when it belongs to another avatar. A failed
  /// fetch keeps whatever was cached before.
  async fn metadata_for(&self, latest: &Identifier) -> Option<AvatarMetadata> {
    let cached = self.state.metadata().await;
    if cached.as_ref().is_some_and(|m| &m.id == latest) {
      return cached;
    }

    match tokio::time::timeout(self.metadata_timeout, self.metadata.fetch(latest)).await {
      Ok(Ok(metadata)) => {
        self.state.set_metadata(metadata.clone()).await;
        Some(metadata)
      }
      Ok(Err(e)) => {
        warn!(avatar_id = %latest, err = %e, "Metadata fetch failed");
        cached
      }
      Err(_) => {
        warn!(avatar_id = %latest, "Metadata fetch timed out");
        cached
      }
    }
  }
}
