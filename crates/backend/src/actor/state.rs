use tokio::sync::RwLock;

use crate::{domain::identifier::Identifier, metadata::AvatarMetadata};

/// State shared between the processor and the status refresher.
///
/// The processor confirms avatars after a successful upload; the refresher
/// reads the latest confirmation and caches metadata for it.
#[derive(Debug, Default)]
pub struct RunState {
  inner: RwLock<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
  latest: Option<Identifier>,
  metadata: Option<AvatarMetadata>,
}

impl RunState {
  pub fn new() -> Self {
    Self::default()
  }

  /// Mark `id` as the most recently uploaded avatar.
  pub async fn confirm(&self, id: Identifier) {
    self.inner.write().await.latest = Some(id);
  }

  pub async fn latest(&self) -> Option<Identifier> {
    self.inner.read().await.latest.clone()
  }

  pub async fn metadata(&self) -> Option<AvatarMetadata> {
    self.inner.read().await.metadata.clone()
  }

  pub async fn set_metadata(&self, metadata: AvatarMetadata) {
    self.inner.write().await.metadata = Some(metadata);
  }
}
