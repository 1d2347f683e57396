//! SQLite schema for the avatar cache.
//!
//! Each entry in [`MIGRATIONS`] moves the database to the version it is keyed
//! by. New versions are appended; existing entries never change.

/// Schema version written to `PRAGMA user_version` after migrating.
pub const CURRENT_VERSION: i64 = 1;

pub const MIGRATIONS: &[(i64, &[&str])] = &[(
  1,
  &[
    r#"
    CREATE TABLE IF NOT EXISTS avatars (
      id TEXT PRIMARY KEY,
      created_at INTEGER NOT NULL,
      updated_at INTEGER NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_avatars_updated_at ON avatars(updated_at)",
  ],
)];
