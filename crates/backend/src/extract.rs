//! Avatar id extraction from log files.
//!
//! Extraction is stateless: every call scans the whole file and returns the
//! distinct ids found. Deduplication across calls is the cache's job.

use std::{collections::HashSet, path::Path};

use tracing::{trace, warn};

use crate::domain::identifier::{IDENTIFIER_PATTERN, Identifier};

/// Scan a log file for avatar ids.
///
/// Missing files and read failures yield an empty set. Bytes that are not
/// valid UTF-8 are replaced rather than failing the read.
pub async fn extract(path: &Path) -> HashSet<Identifier> {
  if !path.is_file() {
    trace!(path = %path.display(), "Not a file, nothing to extract");
    return HashSet::new();
  }

  match tokio::fs::read(path).await {
    Ok(bytes) => {
      let found = extract_from_str(&String::from_utf8_lossy(&bytes));
      trace!(path = %path.display(), count = found.len(), "Extracted avatar ids");
      found
    }
    Err(e) => {
      warn!(path = %path.display(), err = %e, "Failed to read log file");
      HashSet::new()
    }
  }
}

/// Collect every distinct avatar id in `text`, line by line.
pub fn extract_from_str(text: &str) -> HashSet<Identifier> {
  text
    .lines()
    .flat_map(|line| IDENTIFIER_PATTERN.find_iter(line))
    .map(Identifier::from_match)
    .collect()
}
