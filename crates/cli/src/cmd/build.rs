//! Implementation of the `soup build` command.
//!
//! Loads the package graph, then generates and incrementally evaluates every
//! package in dependency order.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Args;

use soup_lib::build::build;
use soup_lib::evaluate::{EvaluateOptions, PlainMonitor, ScanMonitor};
use soup_lib::generate::ProcessGenerator;

use super::{TargetArgs, load_packages};
use crate::output::{print_build_summary, print_json};

#[derive(Debug, Args)]
pub struct BuildArgs {
  /// Package directory containing a Recipe.toml
  #[arg(default_value = ".")]
  pub path: PathBuf,

  #[command(flatten)]
  pub target: TargetArgs,

  /// Maximum number of operations running at once (defaults to the CPU count)
  #[arg(short, long)]
  pub jobs: Option<usize>,

  /// Kill operations that run longer than this (e.g. "10m", "90s")
  #[arg(long, value_parser = humantime::parse_duration)]
  pub timeout: Option<Duration>,

  /// Executable that turns a package's generate input into its operation graph
  #[arg(long, default_value = "soup-generate")]
  pub generator: PathBuf,

  /// Extra argument passed to the generator before the state directory
  #[arg(long = "generator-arg", allow_hyphen_values = true)]
  pub generator_args: Vec<String>,

  /// Scan declared write access for files each operation wrote
  #[arg(long)]
  pub scan_writes: bool,

  /// Output the build summary as JSON
  #[arg(long)]
  pub json: bool,
}

pub fn cmd_build(args: BuildArgs) -> Result<()> {
  let started = Instant::now();
  let (config, provider) = load_packages(&args.path, &args.target)?;

  let mut options = EvaluateOptions {
    operation_timeout: args.timeout,
    ..EvaluateOptions::default()
  };
  if let Some(jobs) = args.jobs {
    options.parallelism = jobs.max(1);
  }

  let generator = ProcessGenerator::new(&args.generator).with_arguments(args.generator_args);
  let state_root = &config.roots.state_root;

  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let summary = if args.scan_writes {
    rt.block_on(build(&provider, state_root, &generator, Arc::new(ScanMonitor), options))
  } else {
    rt.block_on(build(&provider, state_root, &generator, Arc::new(PlainMonitor), options))
  }
  .context("Build failed")?;

  if args.json {
    return print_json(&summary);
  }

  print_build_summary(&summary, started.elapsed());
  Ok(())
}
