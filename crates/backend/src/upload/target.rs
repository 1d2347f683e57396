//! Concrete upload targets.
//!
//! All three services share one retry loop in [`HttpTarget`]; they differ only
//! in their [`TargetPolicy`]: where to POST, how to shape the body, what
//! counts as accepted, and how long to back off.

use std::{fmt, sync::Arc};

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{
  SubmitOutcome, UploadTarget,
  http::{HttpPoster, HttpReply, UploadRequest},
  retry::RetryPolicy,
};
use crate::domain::identifier::Identifier;

pub const AVTRDB_URL: &str = "https://api.avtrdb.com/v2/avatar/ingest";
pub const PAW_URL: &str = "https://paw-api.amelia.fun/update";
pub const VRCWB_URL: &str = "https://avatar.worldbalancer.com/v1/vrchat/avatars/store/putavatarExternal";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetKind {
  AvtrDb,
  Paw,
  VrcWb,
}

impl TargetKind {
  pub const ALL: [TargetKind; 3] = [TargetKind::AvtrDb, TargetKind::Paw, TargetKind::VrcWb];

  /// Parse a target name as written in the config file (case-insensitive).
  pub fn from_config_name(name: &str) -> Option<Self> {
    match name.trim().to_ascii_uppercase().as_str() {
      "AVTRDB" => Some(TargetKind::AvtrDb),
      "PAW" => Some(TargetKind::Paw),
      "VRCWB" => Some(TargetKind::VrcWb),
      _ => None,
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      TargetKind::AvtrDb => "avtrDB",
      TargetKind::Paw => "PAW",
      TargetKind::VrcWb => "VRCWB",
    }
  }
}

impl fmt::Display for TargetKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// How the avatar id travels in the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadShape {
  /// `{"avatar_ids": [id], "attribution": attribution}`
  IngestBatch { attribution: String },
  /// `?avatarId=<id>`, no body
  QueryParam,
  /// `{"id": id, "userid": attribution}`
  External { attribution: String },
}

impl PayloadShape {
  fn request(&self, url: &str, id: &Identifier) -> UploadRequest {
    let (query, body) = match self {
      PayloadShape::IngestBatch { attribution } => (
        Vec::new(),
        Some(json!({ "avatar_ids": [id.as_str()], "attribution": attribution })),
      ),
      PayloadShape::QueryParam => (vec![("avatarId".to_string(), id.as_str().to_string())], None),
      PayloadShape::External { attribution } => {
        (Vec::new(), Some(json!({ "id": id.as_str(), "userid": attribution })))
      }
    };
    UploadRequest {
      url: url.to_string(),
      query,
      json: body,
    }
  }
}

/// What a non-429 reply must look like to count as accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuccessRule {
  /// 200 with `valid_avatar_ids == 1`
  ValidCountIsOne,
  /// 200 with `success == true`
  SuccessFlag,
  /// 404 and nothing else
  NotFoundStatus,
}

impl SuccessRule {
  pub fn accepts(&self, reply: &HttpReply) -> bool {
    match self {
      SuccessRule::ValidCountIsOne => {
        reply.status == 200
          && json_body(reply)
            .and_then(|v| v.get("valid_avatar_ids").and_then(Value::as_f64))
            .is_some_and(|n| n == 1.0)
      }
      SuccessRule::SuccessFlag => {
        reply.status == 200
          && json_body(reply)
            .and_then(|v| v.get("success").and_then(Value::as_bool))
            .unwrap_or(false)
      }
      SuccessRule::NotFoundStatus => reply.status == 404,
    }
  }
}

fn json_body(reply: &HttpReply) -> Option<Value> {
  serde_json::from_str(&reply.body).ok()
}

/// Everything that distinguishes one target from another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetPolicy {
  pub kind: TargetKind,
  pub url: String,
  pub payload: PayloadShape,
  pub success: SuccessRule,
  pub retry: RetryPolicy,
}

impl TargetPolicy {
  pub fn avtrdb(attribution: &str) -> Self {
    Self {
      kind: TargetKind::AvtrDb,
      url: AVTRDB_URL.to_string(),
      payload: PayloadShape::IngestBatch {
        attribution: attribution.to_string(),
      },
      success: SuccessRule::ValidCountIsOne,
      retry: RetryPolicy::secs((10, 30), (5, 30)),
    }
  }

  pub fn paw() -> Self {
    Self {
      kind: TargetKind::Paw,
      url: PAW_URL.to_string(),
      payload: PayloadShape::QueryParam,
      success: SuccessRule::SuccessFlag,
      retry: RetryPolicy::secs((10, 30), (5, 30)),
    }
  }

  pub fn vrcwb(attribution: &str) -> Self {
    Self {
      kind: TargetKind::VrcWb,
      url: VRCWB_URL.to_string(),
      payload: PayloadShape::External {
        attribution: attribution.to_string(),
      },
      success: SuccessRule::NotFoundStatus,
      retry: RetryPolicy::secs((60, 120), (30, 120)),
    }
  }

  pub fn for_kind(kind: TargetKind, attribution: &str) -> Self {
    match kind {
      TargetKind::AvtrDb => Self::avtrdb(attribution),
      TargetKind::Paw => Self::paw(),
      TargetKind::VrcWb => Self::vrcwb(attribution),
    }
  }

  pub fn request(&self, id: &Identifier) -> UploadRequest {
    self.payload.request(&self.url, id)
  }
}

/// An [`UploadTarget`] that POSTs over an [`HttpPoster`] and retries per its
/// policy.
pub struct HttpTarget {
  policy: TargetPolicy,
  poster: Arc<dyn HttpPoster>,
  cancel: CancellationToken,
}

impl HttpTarget {
  pub fn new(policy: TargetPolicy, poster: Arc<dyn HttpPoster>, cancel: CancellationToken) -> Self {
    Self { policy, poster, cancel }
  }

  pub fn policy(&self) -> &TargetPolicy {
    &self.policy
  }
}

#[async_trait]
impl UploadTarget for HttpTarget {
  fn kind(&self) -> TargetKind {
    self.policy.kind
  }

  async fn submit(&self, id: &Identifier) -> SubmitOutcome {
    let request = self.policy.request(id);
    let retry = self.policy.retry;
    let service = self.policy.kind;

    // One budget shared by both failure kinds
    let mut retries = 0u32;

    // The first attempt always goes out, so work drained during shutdown is
    // still delivered once. Only backoffs yield to cancellation.
    loop {
      let delay = match self.poster.post(&request).await {
        Ok(reply) if reply.status == 429 => {
          if retries >= retry.max_retries {
            warn!(%service, avatar_id = %id, "Rate limited, retries exhausted");
            return SubmitOutcome::Exhausted;
          }
          let delay = retry.rate_limited.delay_for_attempt(retries);
          debug!(%service, avatar_id = %id, delay_secs = delay.as_secs(), "Rate limited, backing off");
          delay
        }
        Ok(reply) => {
          if self.policy.success.accepts(&reply) {
            debug!(%service, avatar_id = %id, status = reply.status, "Upload accepted");
            return SubmitOutcome::Accepted;
          }
          debug!(%service, avatar_id = %id, status = reply.status, "Upload rejected");
          return SubmitOutcome::Rejected { status: reply.status };
        }
        Err(e) if e.is_retryable() => {
          if retries >= retry.max_retries {
            warn!(%service, avatar_id = %id, err = %e, "Network error, retries exhausted");
            return SubmitOutcome::Exhausted;
          }
          let delay = retry.network.delay_for_attempt(retries);
          debug!(%service, avatar_id = %id, err = %e, delay_secs = delay.as_secs(), "Network error, backing off");
          delay
        }
        Err(e) => {
          warn!(%service, avatar_id = %id, err = %e, "Request could not be sent");
          return SubmitOutcome::Exhausted;
        }
      };

      retries += 1;

      tokio::select! {
        _ = self.cancel.cancelled() => {
          debug!(%service, avatar_id = %id, "Backoff interrupted by shutdown");
          return SubmitOutcome::Cancelled;
        }
        _ = tokio::time::sleep(delay) => {}
      }
    }
  }
}
