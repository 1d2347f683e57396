//! Avatar metadata lookup for the detailed presence status.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::{domain::identifier::Identifier, upload::http::USER_AGENT};

pub const PAW_AVATAR_URL: &str = "https://paw-api.amelia.fun/avatar";

/// Display metadata for one avatar. Text fields are never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvatarMetadata {
  pub id: Identifier,
  pub name: String,
  pub author_name: String,
  pub description: String,
  pub image_url: Option<String>,
}

impl AvatarMetadata {
  /// Build metadata from raw fields, trimming and filling empty values.
  pub fn normalized(id: Identifier, name: &str, author_name: &str, description: &str, image_url: &str) -> Self {
    fn or_default(value: &str, fallback: &str) -> String {
      let trimmed = value.trim();
      if trimmed.is_empty() {
        fallback.to_string()
      } else {
        trimmed.to_string()
      }
    }

    let image_url = image_url.trim();
    Self {
      id,
      name: or_default(name, "Unknown Avatar"),
      author_name: or_default(author_name, "Unknown Author"),
      description: or_default(description, "No description available"),
      image_url: (!image_url.is_empty()).then(|| image_url.to_string()),
    }
  }

  /// Parse a `{"result": {...}}` response body.
  pub fn from_response(id: Identifier, body: &Value) -> Result<Self, MetadataError> {
    let result = body
      .get("result")
      .and_then(Value::as_object)
      .ok_or(MetadataError::InvalidFormat)?;

    let field = |key: &str| result.get(key).and_then(Value::as_str).unwrap_or_default();

    Ok(Self::normalized(
      id,
      field("name"),
      field("author_name"),
      field("description"),
      field("image_url"),
    ))
  }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum MetadataError {
  #[error("Metadata request failed: HTTP {0}")]
  Status(u16),
  #[error("Metadata request timed out")]
  Timeout,
  #[error("Network error: {0}")]
  Network(String),
  #[error("Invalid avatar data format")]
  InvalidFormat,
}

impl From<reqwest::Error> for MetadataError {
  fn from(e: reqwest::Error) -> Self {
    if e.is_timeout() {
      MetadataError::Timeout
    } else if e.is_decode() {
      MetadataError::InvalidFormat
    } else {
      MetadataError::Network(e.to_string())
    }
  }
}

#[async_trait]
pub trait MetadataSource: Send + Sync {
  async fn fetch(&self, id: &Identifier) -> Result<AvatarMetadata, MetadataError>;
}

/// Metadata from the PAW avatar endpoint.
#[derive(Debug, Clone)]
pub struct PawMetadata {
  client: reqwest::Client,
  url: String,
}

impl PawMetadata {
  pub fn new(timeout: Duration) -> Result<Self, MetadataError> {
    let client = reqwest::Client::builder()
      .user_agent(USER_AGENT)
      .timeout(timeout)
      .build()
      .map_err(|e| MetadataError::Network(e.to_string()))?;
    Ok(Self {
      client,
      url: PAW_AVATAR_URL.to_string(),
    })
  }
}

#[async_trait]
impl MetadataSource for PawMetadata {
  async fn fetch(&self, id: &Identifier) -> Result<AvatarMetadata, MetadataError> {
    let url = reqwest::Url::parse_with_params(&self.url, [("avatarId", id.as_str())])
      .map_err(|e| MetadataError::Network(e.to_string()))?;

    let response = self.client.get(url).send().await?;
    let status = response.status().as_u16();
    if status != 200 {
      return Err(MetadataError::Status(status));
    }

    let body: Value = response.json().await?;
    let metadata = AvatarMetadata::from_response(id.clone(), &body)?;
    debug!(avatar_id = %id, name = %metadata.name, "Fetched avatar metadata");
    Ok(metadata)
  }
}
