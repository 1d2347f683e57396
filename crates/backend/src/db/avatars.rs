//! Seen-avatar cache with a retention window.
//!
//! # Fail-open
//!
//! When the database misbehaves, [`DedupCache::observe`] reports the avatar as
//! new. A duplicate upload is harmless for the targets; a missed one is not
//! recoverable.

use std::{path::Path, time::Duration};

use chrono::Utc;
use sqlx::{FromRow, sqlite::SqlitePool};
use tracing::{debug, error, info};

use super::connection::{Result, open_pool};
use crate::domain::{config::CacheConfig, identifier::Identifier};

/// One row of the `avatars` table. Timestamps are unix seconds.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct CacheRecord {
  pub id: String,
  pub created_at: i64,
  pub updated_at: i64,
}

/// Persistent record of when each avatar was last announced.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct DedupCache {
  pool: SqlitePool,
  retention: Duration,
}

impl DedupCache {
  /// Open the cache at `path` using the pool size and retention from `config`.
  pub async fn open(path: &Path, config: &CacheConfig) -> Result<Self> {
    let pool = open_pool(path, config.pool_size).await?;
    Ok(Self {
      pool,
      retention: config.retention(),
    })
  }

  pub fn retention(&self) -> Duration {
    self.retention
  }

  /// Record an observation of `id` now. See [`DedupCache::observe_at`].
  pub async fn observe(&self, id: &Identifier) -> bool {
    self.observe_at(id, Utc::now().timestamp()).await
  }

  /// Record an observation of `id` at `now` (unix seconds).
  ///
  /// Returns `true` when the avatar is unknown or was last seen before the
  /// retention window, in which case `updated_at` moves to `now` and the
  /// original `created_at` is kept. Returns `false` without writing when it
  /// was seen inside the window.
  ///
  /// The check and the write are one statement, so concurrent observers of
  /// the same id cannot both see it as new.
  pub async fn observe_at(&self, id: &Identifier, now: i64) -> bool {
    let cutoff = now - self.retention_secs();

    let result = sqlx::query(
      r#"
      INSERT INTO avatars (id, created_at, updated_at)
      VALUES (?1, ?2, ?2)
      ON CONFLICT(id) DO UPDATE SET updated_at = excluded.updated_at
      WHERE avatars.updated_at < ?3
      "#,
    )
    .bind(id.as_str())
    .bind(now)
    .bind(cutoff)
    .execute(&self.pool)
    .await;

    match result {
      Ok(done) => {
        let is_new = done.rows_affected() > 0;
        debug!(avatar_id = %id, is_new, "Cache observation");
        is_new
      }
      Err(e) => {
        error!(avatar_id = %id, err = %e, "Cache error, treating avatar as new");
        true
      }
    }
  }

  /// Fetch the stored record for `id`, ignoring the retention window.
  pub async fn record(&self, id: &Identifier) -> Result<Option<CacheRecord>> {
    let record = sqlx::query_as::<_, CacheRecord>("SELECT id, created_at, updated_at FROM avatars WHERE id = ?1")
      .bind(id.as_str())
      .fetch_optional(&self.pool)
      .await?;
    Ok(record)
  }

  /// Physically delete rows that fell out of the retention window.
  pub async fn prune_expired(&self, now: i64) -> Result<u64> {
    let cutoff = now - self.retention_secs();
    let done = sqlx::query("DELETE FROM avatars WHERE updated_at < ?1")
      .bind(cutoff)
      .execute(&self.pool)
      .await?;

    if done.rows_affected() > 0 {
      info!(pruned = done.rows_affected(), "Pruned expired avatar records");
    }
    Ok(done.rows_affected())
  }

  /// Close every pooled connection.
  pub async fn close(&self) {
    self.pool.close().await;
  }

  fn retention_secs(&self) -> i64 {
    i64::try_from(self.retention.as_secs()).unwrap_or(i64::MAX)
  }
}
