use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tracing::{debug, info};

use super::{DEFAULT_IMAGE, DetailedStatus, PresenceError, PresenceSink};

/// Presence sink that writes each update to the log.
#[derive(Debug, Default)]
pub struct LogPresence {
  connected: AtomicBool,
}

impl LogPresence {
  pub fn new() -> Self {
    Self::default()
  }
}

#[async_trait]
impl PresenceSink for LogPresence {
  async fn connect(&self) -> Result<(), PresenceError> {
    self.connected.store(true, Ordering::SeqCst);
    info!("Presence connected (log)");
    Ok(())
  }

  fn is_connected(&self) -> bool {
    self.connected.load(Ordering::SeqCst)
  }

  fn mark_disconnected(&self) {
    if self.connected.swap(false, Ordering::SeqCst) {
      debug!("Presence marked disconnected");
    }
  }

  async fn push_status(&self, text: &str) -> Result<(), PresenceError> {
    if !self.is_connected() {
      debug!("Skipping presence update, not connected");
      return Err(PresenceError::NotConnected);
    }
    info!(status = %text, "Presence");
    Ok(())
  }

  async fn push_detailed_status(&self, status: &DetailedStatus) -> Result<(), PresenceError> {
    if !self.is_connected() {
      debug!("Skipping avatar presence, not connected");
      return Err(PresenceError::NotConnected);
    }
    info!(
      avatar = %status.details,
      state = %status.state,
      image = %status.image_url.as_deref().unwrap_or(DEFAULT_IMAGE),
      description = %status.description,
      "Presence"
    );
    Ok(())
  }

  async fn close(&self) {
    if self.connected.swap(false, Ordering::SeqCst) {
      info!("Presence closed");
    }
  }
}
