use std::{fmt, sync::LazyLock};

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Avatar id pattern as it appears in client logs.
pub static IDENTIFIER_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"avtr_[0-9a-f]{8}-(?:[0-9a-f]{4}-){3}[0-9a-f]{12}").expect("identifier pattern is valid")
});

/// An avatar identifier (`avtr_` followed by a lowercase UUID).
///
/// Identifiers are opaque and compared by exact string equality. The only
/// ways to build one are [`Identifier::parse`] and the extractor, so every
/// value in the system has the canonical shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identifier(String);

impl Identifier {
  /// Parse a full identifier. The whole input must match the pattern.
  pub fn parse(raw: &str) -> Option<Self> {
    let raw = raw.trim();
    IDENTIFIER_PATTERN
      .find(raw)
      .filter(|m| m.start() == 0 && m.end() == raw.len())
      .map(|m| Self(m.as_str().to_string()))
  }

  /// Wrap a regex match that is already known to be canonical.
  pub(crate) fn from_match(m: regex::Match<'_>) -> Self {
    Self(m.as_str().to_string())
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }

  /// Deep link understood by VRCX.
  pub fn vrcx_link(&self) -> String {
    format!("vrcx://avatar/{}", self.0)
  }
}

impl fmt::Display for Identifier {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl AsRef<str> for Identifier {
  fn as_ref(&self) -> &str {
    &self.0
  }
}

impl TryFrom<String> for Identifier {
  type Error = String;

  fn try_from(value: String) -> Result<Self, Self::Error> {
    Self::parse(&value).ok_or_else(|| format!("not an avatar id: {}", value))
  }
}

impl From<Identifier> for String {
  fn from(value: Identifier) -> Self {
    value.0
  }
}
