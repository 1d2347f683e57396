use std::{path::Path, time::Duration};

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use thiserror::Error;
use tracing::{debug, error, info};

use crate::db::schema;

#[derive(Error, Debug)]
pub enum DbError {
  #[error("SQLite error: {0}")]
  Sqlite(#[from] sqlx::Error),
  #[error("IO error: {0}")]
  Io(#[from] std::io::Error),
  #[error("Database schema version {found} is newer than supported version {supported}")]
  UnsupportedVersion { found: i64, supported: i64 },
}

pub type Result<T> = std::result::Result<T, DbError>;

/// How long a caller waits for a pooled connection before giving up.
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);

/// How long SQLite waits on a locked database before returning busy.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Open (creating if needed) the SQLite database and run migrations.
///
/// The pool holds at most `pool_size` connections; callers beyond that wait
/// for a connection to be released.
pub async fn open_pool(db_path: &Path, pool_size: u32) -> Result<SqlitePool> {
  // Ensure directory exists
  if let Some(parent) = db_path.parent()
    && !parent.as_os_str().is_empty()
  {
    tokio::fs::create_dir_all(parent).await?;
  }

  info!(path = %db_path.display(), pool_size, "Opening avatar cache");

  let options = SqliteConnectOptions::new()
    .filename(db_path)
    .create_if_missing(true)
    .journal_mode(SqliteJournalMode::Wal)
    .foreign_keys(true)
    .busy_timeout(BUSY_TIMEOUT);

  let pool = match SqlitePoolOptions::new()
    .max_connections(pool_size.max(1))
    .acquire_timeout(ACQUIRE_TIMEOUT)
    .connect_with(options)
    .await
  {
    Ok(pool) => {
      debug!(path = %db_path.display(), "Database pool established");
      pool
    }
    Err(e) => {
      error!(path = %db_path.display(), err = %e, "Failed to open database");
      return Err(e.into());
    }
  };

  migrate(&pool).await?;

  Ok(pool)
}

/// Bring the schema up to [`schema::CURRENT_VERSION`].
///
/// Versions are tracked in `PRAGMA user_version`; each step runs in its own
/// transaction together with the version bump.
async fn migrate(pool: &SqlitePool) -> Result<()> {
  let mut tx = pool.begin().await?;
  let version: i64 = sqlx::query_scalar("PRAGMA user_version").fetch_one(&mut *tx).await?;

  if version > schema::CURRENT_VERSION {
    return Err(DbError::UnsupportedVersion {
      found: version,
      supported: schema::CURRENT_VERSION,
    });
  }

  for (target, statements) in schema::MIGRATIONS.iter().filter(|(target, _)| *target > version) {
    debug!(from = version, to = target, "Applying schema migration");
    for statement in *statements {
      sqlx::query(statement).execute(&mut *tx).await?;
    }
    sqlx::query(&format!("PRAGMA user_version = {}", target))
      .execute(&mut *tx)
      .await?;
  }

  tx.commit().await?;
  Ok(())
}
