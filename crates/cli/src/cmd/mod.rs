mod build;
mod graph;
mod info;
mod inspect;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use tracing::debug;

use soup_lib::config::SoupConfig;
use soup_lib::language::LanguageRegistry;
use soup_lib::load::{LoadOptions, PackageLoader};
use soup_lib::package::PackageProvider;
use soup_lib::platform::{Arch, Os, Platform, build_parameters};
use soup_lib::value::ValueTable;

pub use build::{BuildArgs, cmd_build};
pub use graph::cmd_graph;
pub use info::cmd_info;
pub use inspect::cmd_inspect;

/// Parameters of the root package graph.
#[derive(Debug, Clone, Args)]
pub struct TargetArgs {
  /// Build flavor of the root graph
  #[arg(long, default_value = "Debug")]
  pub flavor: String,

  /// Target architecture: x64 or arm64 (defaults to the host)
  #[arg(long)]
  pub arch: Option<Arch>,

  /// Target system: Linux, MacOS or Windows (defaults to the host)
  #[arg(long)]
  pub system: Option<Os>,
}

impl TargetArgs {
  fn parameters(&self, host: &Platform) -> ValueTable {
    build_parameters(
      self.arch.unwrap_or(host.arch).as_str(),
      self.system.unwrap_or(host.os).as_str(),
      &self.flavor,
    )
  }
}

fn package_directory(path: &Path) -> Result<PathBuf> {
  let cwd = std::env::current_dir().context("Failed to read current directory")?;
  Ok(cwd.join(path))
}

/// Load configuration and the package graph rooted at `path`.
fn load_packages(path: &Path, target: &TargetArgs) -> Result<(SoupConfig, PackageProvider)> {
  let directory = package_directory(path)?;
  let config = SoupConfig::load(&directory).context("Failed to load configuration")?;
  let languages = LanguageRegistry::from_config(&config);
  let host = Platform::current().context("Unsupported host platform")?;
  debug!(host = %host, state = %config.roots.state_root.display(), "Configuration loaded");

  let options = LoadOptions {
    target_parameters: target.parameters(&host),
    host_parameters: host.host_parameters(),
  };
  let provider = PackageLoader::new(&config, &languages, options)
    .load(&directory)
    .context("Load failed")?;
  Ok((config, provider))
}
