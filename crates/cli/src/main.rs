//! soup: incremental build orchestrator.

mod cmd;
mod output;

use std::path::PathBuf;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cmd::{BuildArgs, TargetArgs};

#[derive(Parser)]
#[command(name = "soup")]
#[command(author, version, about = "Incremental build orchestrator", long_about = None)]
struct Cli {
  /// Increase log output (-v info, -vv debug, -vvv trace). RUST_LOG overrides.
  #[arg(short, long, global = true, action = ArgAction::Count)]
  verbose: u8,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Build a package and everything it depends on
  Build(BuildArgs),

  /// Load a package and print its package graphs
  Graph {
    /// Package directory containing a Recipe.toml
    #[arg(default_value = ".")]
    path: PathBuf,

    #[command(flatten)]
    target: TargetArgs,

    /// Output as JSON
    #[arg(long)]
    json: bool,
  },

  /// Decode a binary state file (.bvt, .bog, .bor or the file system state)
  Inspect {
    file: PathBuf,

    /// Output as JSON
    #[arg(long)]
    json: bool,
  },

  /// Show the host platform and the directories soup uses
  Info,
}

fn init_logging(verbose: u8) {
  let default = match verbose {
    0 => "warn",
    1 => "info",
    2 => "debug",
    _ => "trace",
  };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();
}

fn main() -> Result<()> {
  let cli = Cli::parse();
  init_logging(cli.verbose);

  match cli.command {
    Commands::Build(args) => cmd::cmd_build(args),
    Commands::Graph { path, target, json } => cmd::cmd_graph(&path, &target, json),
    Commands::Inspect { file, json } => cmd::cmd_inspect(&file, json),
    Commands::Info => cmd::cmd_info(),
  }
}
