//! Foreground daemon command

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use avtrlog::{Daemon, config::Config};
use tracing::info;

/// Watch `paths` (or the configured paths when none are given) until ctrl-c.
pub async fn cmd_run(mut config: Config, paths: Vec<PathBuf>) -> Result<()> {
  if !paths.is_empty() {
    config.watcher.paths = paths;
  }
  if config.watcher.paths.is_empty() {
    bail!("No log paths given. Pass them as arguments or set `paths` under [watcher] in the config");
  }

  for path in &config.watcher.paths {
    info!(path = %path.display(), "Configured log path");
  }

  Daemon::new(config).run().await.context("Daemon failed")?;
  Ok(())
}
