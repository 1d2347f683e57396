//! avtrlog CLI - watch client logs and share newly seen avatars

use std::path::PathBuf;

use anyhow::Result;
use avtrlog::config::Config;
use clap::{Parser, Subcommand};

mod commands;
mod logging;

use commands::{cmd_config_init, cmd_config_show, cmd_run};
use logging::{init_cli_logging, init_daemon_logging};

#[derive(Parser)]
#[command(name = "avtrlog")]
#[command(version)]
#[command(about = "Watch client logs and share newly seen avatars")]
#[command(after_help = "\
QUICK START:
  avtrlog config init             # Write a config template
  avtrlog run ~/path/to/logs      # Watch the newest output_log_*.txt in a directory

LOGGING:
  RUST_LOG=debug avtrlog run ...  # Override the configured level
  avtrlog run --log-file ...      # Write rolling logs to the data directory")]
struct Cli {
  /// Config file (default: user config, then built-in defaults)
  #[arg(long, global = true, value_name = "FILE")]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Watch log files until ctrl-c
  Run {
    /// Log files or directories (overrides [watcher] paths)
    paths: Vec<PathBuf>,
    /// Log to a rolling file instead of the console
    #[arg(long)]
    log_file: bool,
  },
  /// Configuration management
  Config {
    #[command(subcommand)]
    command: ConfigCommand,
  },
}

/// Subcommands for `avtrlog config`
#[derive(Subcommand)]
enum ConfigCommand {
  /// Show the effective configuration
  Show,
  /// Write a commented config template to the user config path
  Init {
    /// Overwrite an existing file
    #[arg(long)]
    force: bool,
  },
}

#[tokio::main]
async fn main() -> Result<()> {
  let cli = Cli::parse();
  let config = Config::load(cli.config.as_deref());

  // Keep the file writer alive for the whole run
  let _guard = match &cli.command {
    Commands::Run { log_file, .. } => init_daemon_logging(&config.log, *log_file),
    Commands::Config { .. } => {
      init_cli_logging();
      None
    }
  };

  match cli.command {
    Commands::Run { paths, .. } => cmd_run(config, paths).await,
    Commands::Config { command } => match command {
      ConfigCommand::Show => cmd_config_show(cli.config.as_deref(), &config),
      ConfigCommand::Init { force } => cmd_config_init(force),
    },
  }
}
