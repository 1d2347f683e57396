//! HTTP transport used by upload targets.
//!
//! Targets describe a request as data ([`UploadRequest`]) and hand it to an
//! [`HttpPoster`]. Production uses [`ReqwestPoster`]; tests substitute a
//! scripted poster.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::trace;

/// Sent with every outgoing request.
pub const USER_AGENT: &str = concat!("avtrlog/", env!("CARGO_PKG_VERSION"));

/// A POST request as described by a target policy.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadRequest {
  pub url: String,
  pub query: Vec<(String, String)>,
  pub json: Option<Value>,
}

/// Status and raw body of a completed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
  pub status: u16,
  pub body: String,
}

impl HttpReply {
  pub fn new(status: u16, body: impl Into<String>) -> Self {
    Self {
      status,
      body: body.into(),
    }
  }
}

/// Faults below the HTTP layer. Only a malformed URL is permanent.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
  #[error("Request timed out")]
  Timeout,
  #[error("Network error: {0}")]
  Network(String),
  #[error("Invalid request URL: {0}")]
  InvalidUrl(String),
}

impl TransportError {
  pub fn is_retryable(&self) -> bool {
    !matches!(self, TransportError::InvalidUrl(_))
  }
}

#[async_trait]
pub trait HttpPoster: Send + Sync {
  async fn post(&self, request: &UploadRequest) -> Result<HttpReply, TransportError>;
}

/// [`HttpPoster`] backed by a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestPoster {
  client: reqwest::Client,
}

impl ReqwestPoster {
  pub fn new(timeout: Duration) -> Result<Self, TransportError> {
    let client = reqwest::Client::builder()
      .user_agent(USER_AGENT)
      .timeout(timeout)
      .build()
      .map_err(|e| TransportError::Network(e.to_string()))?;
    Ok(Self { client })
  }
}

impl From<reqwest::Error> for TransportError {
  fn from(e: reqwest::Error) -> Self {
    if e.is_timeout() {
      TransportError::Timeout
    } else {
      TransportError::Network(e.to_string())
    }
  }
}

#[async_trait]
impl HttpPoster for ReqwestPoster {
  async fn post(&self, request: &UploadRequest) -> Result<HttpReply, TransportError> {
    // parse_with_params leaves a bare `?` when there are no pairs
    let url = if request.query.is_empty() {
      reqwest::Url::parse(&request.url)
    } else {
      reqwest::Url::parse_with_params(&request.url, &request.query)
    }
    .map_err(|e| TransportError::InvalidUrl(format!("{}: {}", request.url, e)))?;

    let mut builder = self.client.post(url);
    if let Some(ref json) = request.json {
      builder = builder.json(json);
    }

    let response = builder.send().await?;
    let status = response.status().as_u16();
    let body = response.text().await?;

    trace!(url = %request.url, status, body_len = body.len(), "Upload response received");

    Ok(HttpReply { status, body })
  }
}
