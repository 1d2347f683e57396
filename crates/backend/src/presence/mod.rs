//! Presence display integration.
//!
//! The daemon reports what it is doing through a [`PresenceSink`]: short
//! generic statuses ("Starting up", "Watching for logs") and a detailed status
//! describing the last avatar that was successfully uploaded.

mod log;

use async_trait::async_trait;
use tracing::warn;

pub use log::LogPresence;

/// Upper bound on the description shown in a detailed status, in characters.
pub const MAX_DESCRIPTION_LENGTH: usize = 128;

/// Image shown when a status has no image of its own.
pub const DEFAULT_IMAGE: &str = "avtrlog";

pub const STATUS_STARTING: &str = "Starting up";
pub const STATUS_WATCHING: &str = "Watching for logs";
pub const STATUS_PROCESSING: &str = "Processing avatars";

#[derive(Debug, Clone, thiserror::Error)]
pub enum PresenceError {
  #[error("Presence sink not connected")]
  NotConnected,
  #[error("Presence connection failed: {0}")]
  Connect(String),
  #[error("Presence update failed: {0}")]
  Update(String),
}

/// Rich status for one avatar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailedStatus {
  /// Avatar name
  pub details: String,
  /// `"by <author>"`
  pub state: String,
  pub image_url: Option<String>,
  /// Description, at most [`MAX_DESCRIPTION_LENGTH`] characters
  pub description: String,
}

impl DetailedStatus {
  pub fn new(name: &str, author: &str, description: &str, image_url: Option<&str>) -> Self {
    let name = non_empty(name, "Unknown Avatar");
    let author = non_empty(author, "Unknown Author");
    let description = non_empty(description, "No description available");

    Self {
      details: name.to_string(),
      state: format!("by {author}"),
      image_url: image_url.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string),
      description: truncate_description(description),
    }
  }
}

fn non_empty<'a>(value: &'a str, fallback: &'a str) -> &'a str {
  let trimmed = value.trim();
  if trimmed.is_empty() { fallback } else { trimmed }
}

/// Clamp `text` to [`MAX_DESCRIPTION_LENGTH`] characters, ending in `...` when
/// cut.
pub fn truncate_description(text: &str) -> String {
  if text.chars().count() <= MAX_DESCRIPTION_LENGTH {
    return text.to_string();
  }
  let mut out: String = text.chars().take(MAX_DESCRIPTION_LENGTH - 3).collect();
  out.push_str("...");
  out
}

/// A display that shows the daemon's current activity.
///
/// Callers check [`PresenceSink::is_connected`] before pushing and call
/// [`PresenceSink::mark_disconnected`] when a push fails. Reconnecting is up
/// to the sink.
#[async_trait]
pub trait PresenceSink: Send + Sync {
  async fn connect(&self) -> Result<(), PresenceError>;

  fn is_connected(&self) -> bool;

  /// Record that the display went away. Later pushes are skipped until the
  /// sink reconnects.
  fn mark_disconnected(&self);

  async fn push_status(&self, text: &str) -> Result<(), PresenceError>;

  async fn push_detailed_status(&self, status: &DetailedStatus) -> Result<(), PresenceError>;

  async fn close(&self);
}

/// Push a generic status if the sink is connected, logging any failure.
pub async fn announce(sink: &dyn PresenceSink, text: &str) {
  if !sink.is_connected() {
    return;
  }
  if let Err(e) = sink.push_status(text).await {
    warn!(status = %text, err = %e, "Presence update failed, marking disconnected");
    sink.mark_disconnected();
  }
}
