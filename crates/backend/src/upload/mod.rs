//! Fan-out of newly seen avatars to the public indexing services.
//!
//! Each target is an independent [`UploadTarget`]. [`UploadDispatcher`] runs
//! every target concurrently for one avatar and never lets one target's
//! failure affect another.

pub mod http;
pub mod retry;
pub mod target;

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub use http::{HttpPoster, HttpReply, ReqwestPoster, TransportError, UploadRequest};
pub use retry::{Backoff, RetryPolicy};
pub use target::{HttpTarget, TargetKind, TargetPolicy};

use crate::domain::{config::UploadConfig, identifier::Identifier};

/// Final result of submitting one avatar to one target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
  Accepted,
  /// Definitive answer that was not a success
  Rejected { status: u16 },
  /// Retry budget spent on rate limits or transport faults
  Exhausted,
  /// Shutdown interrupted a backoff
  Cancelled,
}

impl SubmitOutcome {
  pub fn is_success(&self) -> bool {
    matches!(self, SubmitOutcome::Accepted)
  }
}

#[async_trait]
pub trait UploadTarget: Send + Sync {
  fn kind(&self) -> TargetKind;

  /// Submit one avatar, retrying as the target's policy allows.
  async fn submit(&self, id: &Identifier) -> SubmitOutcome;
}

/// Per-target outcomes for one dispatch, in target order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
  pub outcomes: Vec<(TargetKind, SubmitOutcome)>,
}

impl DispatchReport {
  pub fn any_success(&self) -> bool {
    self.outcomes.iter().any(|(_, o)| o.is_success())
  }

  pub fn success_count(&self) -> usize {
    self.outcomes.iter().filter(|(_, o)| o.is_success()).count()
  }
}

pub struct UploadDispatcher {
  targets: Vec<Arc<dyn UploadTarget>>,
}

impl UploadDispatcher {
  pub fn new(targets: Vec<Arc<dyn UploadTarget>>) -> Self {
    Self { targets }
  }

  pub fn is_empty(&self) -> bool {
    self.targets.is_empty()
  }

  pub fn len(&self) -> usize {
    self.targets.len()
  }

  /// Submit `id` to every target concurrently and wait for all of them.
  pub async fn dispatch(&self, id: &Identifier) -> DispatchReport {
    let submissions = self.targets.iter().map(|target| async move {
      let outcome = target.submit(id).await;
      (target.kind(), outcome)
    });

    let outcomes = join_all(submissions).await;

    for (kind, outcome) in &outcomes {
      match outcome {
        SubmitOutcome::Accepted => info!(target_name = %kind, avatar_id = %id, "Uploaded avatar"),
        SubmitOutcome::Cancelled => {}
        other => warn!(target_name = %kind, avatar_id = %id, outcome = ?other, "Upload failed"),
      }
    }

    DispatchReport { outcomes }
  }
}

/// Build the configured targets over a shared poster.
///
/// Unknown target names are logged and skipped. A disabled config yields no
/// targets.
pub fn build_targets(
  config: &UploadConfig,
  poster: Arc<dyn HttpPoster>,
  cancel: &CancellationToken,
) -> Vec<Arc<dyn UploadTarget>> {
  if !config.enabled {
    info!("Uploads disabled");
    return Vec::new();
  }

  let mut kinds: Vec<TargetKind> = Vec::new();
  for name in &config.targets {
    match TargetKind::from_config_name(name) {
      Some(kind) if !kinds.contains(&kind) => kinds.push(kind),
      Some(_) => {}
      None => warn!(name = %name, "Unknown upload target, skipping"),
    }
  }

  kinds
    .into_iter()
    .map(|kind| {
      let policy = TargetPolicy::for_kind(kind, &config.attribution);
      Arc::new(HttpTarget::new(policy, Arc::clone(&poster), cancel.clone())) as Arc<dyn UploadTarget>
    })
    .collect()
}
