use clap::Parser;
use color_eyre::Result;
use std::path::PathBuf;

use swcache::commands::{self, Command};
use swcache::config::Config;
use swcache::logging;

#[derive(Parser, Debug)]
#[command(name = "swcache")]
#[command(about = "Offline asset cache and push notification worker")]
#[command(version)]
struct Args {
  /// Path to config file (default: ./swcache.yaml or $XDG_CONFIG_HOME/swcache/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Keep the cache in memory for this run only
  #[arg(long)]
  ephemeral: bool,

  /// Write logs to this file instead of stderr
  #[arg(long)]
  log_file: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();
  let _log_guard = logging::init(args.log_file.as_deref())?;

  // Load configuration
  let config = Config::load(args.config.as_deref())?;

  commands::execute(args.command, &config, args.ephemeral).await
}
