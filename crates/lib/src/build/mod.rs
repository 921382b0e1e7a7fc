//! Building a loaded package graph.
//!
//! The runner walks the package graphs depth first, dependencies before
//! dependents: build extension graphs, then tool graphs, then runtime
//! dependencies inside the same graph, then the package itself. Each package
//! is generated into an operation graph and then evaluated incrementally
//! against the results of its previous build.
//!
//! # Submodules
//!
//! - [`paths`] - Location of the per-package state files

pub mod paths;

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::codec::CodecError;
use crate::evaluate::{EvaluateError, EvaluateOptions, ProcessMonitor, evaluate};
use crate::fs_state::FileSystemRegistry;
use crate::generate::{GenerateError, GenerateRequest, Generator, build_generate_input};
use crate::operation::{
  OperationResults, carry_over_results, read_operation_graph, read_operation_results, write_operation_graph,
  write_operation_results,
};
use crate::package::{ChildRef, DependencyKind, PackageGraphId, PackageId, PackageInfo, PackageProvider};
use crate::value::write_value_table;

pub use paths::{PackageStatePaths, registry_file};

#[derive(Debug, Error)]
pub enum BuildError {
  #[error("failed to generate {package}: {source}")]
  Generate {
    package: String,
    #[source]
    source: GenerateError,
  },

  #[error("failed to evaluate {package}: {source}")]
  Evaluate {
    package: String,
    #[source]
    source: EvaluateError,
  },

  #[error("failed to write build state for {package}: {source}")]
  State {
    package: String,
    #[source]
    source: CodecError,
  },

  #[error("failed to prepare directory {}: {source}", path.display())]
  Directory {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("package graph {0} is not loaded")]
  UnknownGraph(PackageGraphId),

  #[error("package {0} is not loaded")]
  UnknownPackage(PackageId),

  #[error("failed to access file system state: {0}")]
  Registry(#[source] CodecError),
}

/// Totals for one build run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BuildSummary {
  /// Packages that were generated and evaluated.
  pub packages_built: usize,
  pub packages_prebuilt: usize,
  pub operations_executed: usize,
  pub operations_up_to_date: usize,
}

pub struct BuildRunner<'a, G, M> {
  provider: &'a PackageProvider,
  registry: &'a FileSystemRegistry,
  generator: &'a G,
  monitor: Arc<M>,
  options: EvaluateOptions,
}

impl<'a, G: Generator, M: ProcessMonitor> BuildRunner<'a, G, M> {
  pub fn new(
    provider: &'a PackageProvider,
    registry: &'a FileSystemRegistry,
    generator: &'a G,
    monitor: Arc<M>,
    options: EvaluateOptions,
  ) -> Self {
    Self {
      provider,
      registry,
      generator,
      monitor,
      options,
    }
  }

  /// Build every package reachable from the root graph. The first failure
  /// stops the run.
  pub async fn run(&self) -> Result<BuildSummary, BuildError> {
    let order = self.build_order()?;
    info!(packages = order.len(), "Build order computed");

    let mut summary = BuildSummary::default();
    for package in order {
      if package.is_prebuilt {
        debug!(package = %package.name, "Skipping prebuilt package");
        summary.packages_prebuilt += 1;
        continue;
      }
      self.build_package(package, &mut summary).await?;
      summary.packages_built += 1;
    }

    info!(
      built = summary.packages_built,
      prebuilt = summary.packages_prebuilt,
      executed = summary.operations_executed,
      up_to_date = summary.operations_up_to_date,
      "Build complete"
    );
    Ok(summary)
  }

  /// Packages in the order they must be built.
  fn build_order(&self) -> Result<Vec<&'a PackageInfo>, BuildError> {
    let mut walk = Walk {
      provider: self.provider,
      graphs: HashSet::new(),
      packages: HashSet::new(),
      order: Vec::new(),
    };
    walk.visit_graph(self.provider.root_graph_id)?;
    Ok(walk.order)
  }

  async fn build_package(&self, package: &PackageInfo, summary: &mut BuildSummary) -> Result<(), BuildError> {
    info!(package = %package.name, target = %package.target_directory.display(), "Build package");
    let paths = PackageStatePaths::new(&package.target_directory);
    let state_error = |source| BuildError::State {
      package: package.name.clone(),
      source,
    };
    let generate_error = |source| BuildError::Generate {
      package: package.name.clone(),
      source,
    };

    fs::create_dir_all(&paths.soup_directory).map_err(|source| BuildError::Directory {
      path: paths.soup_directory.clone(),
      source,
    })?;

    let input = build_generate_input(self.provider, package, &paths);
    write_value_table(&paths.generate_input, &input).map_err(state_error)?;

    let request = GenerateRequest {
      package_name: package.name.clone(),
      package_directory: package.package_directory.clone(),
      target_directory: package.target_directory.clone(),
      soup_directory: paths.soup_directory.clone(),
      input,
    };
    let graph = self.generator.generate(&request, self.registry).await.map_err(generate_error)?;
    graph
      .validate()
      .map_err(|e| generate_error(GenerateError::InvalidGraph(e)))?;

    let previous = match read_operation_graph(&paths.operation_graph, self.registry) {
      Ok(previous) => previous,
      Err(e) => {
        warn!(path = %paths.operation_graph.display(), error = %e, "Operation graph corrupted, rebuilding");
        None
      }
    };
    let mut results = match read_operation_results(&paths.operation_results, self.registry) {
      Ok(Some(results)) => results,
      Ok(None) => {
        debug!(path = %paths.operation_results.display(), "No previous operation results");
        OperationResults::new()
      }
      Err(e) => {
        warn!(path = %paths.operation_results.display(), error = %e, "Operation results corrupted, rebuilding");
        OperationResults::new()
      }
    };

    carry_over_results(previous.as_ref(), &graph, &mut results);
    if previous.as_ref() != Some(&graph) {
      // Results on disk must never be older than the graph next to them.
      write_operation_results(&paths.operation_results, &results, self.registry).map_err(state_error)?;
      write_operation_graph(&paths.operation_graph, &graph, self.registry).map_err(state_error)?;
    }

    reset_directory(&paths.temp_directory)?;
    let options = EvaluateOptions {
      temp_directory: Some(paths.temp_directory.clone()),
      ..self.options.clone()
    };
    let evaluated = evaluate(&graph, &mut results, self.registry, &self.monitor, &options).await;
    let written = write_operation_results(&paths.operation_results, &results, self.registry);

    let evaluation = match (evaluated, written) {
      (Ok(evaluation), Ok(())) => evaluation,
      (Ok(_), Err(e)) => return Err(state_error(e)),
      (Err(e), written) => {
        if let Err(write_error) = written {
          warn!(error = %write_error, "Failed to save results of failed evaluation");
        }
        return Err(BuildError::Evaluate {
          package: package.name.clone(),
          source: e,
        });
      }
    };

    summary.operations_executed += evaluation.executed.len();
    summary.operations_up_to_date += evaluation.up_to_date.len();
    Ok(())
  }
}

/// Depth-first walk producing the build order.
struct Walk<'a> {
  provider: &'a PackageProvider,
  graphs: HashSet<PackageGraphId>,
  packages: HashSet<PackageId>,
  order: Vec<&'a PackageInfo>,
}

impl<'a> Walk<'a> {
  fn visit_graph(&mut self, id: PackageGraphId) -> Result<(), BuildError> {
    if !self.graphs.insert(id) {
      debug!(graph = %id, "Graph already built");
      return Ok(());
    }
    let graph = self.provider.graph(id).ok_or(BuildError::UnknownGraph(id))?;
    self.visit_package(graph.root_package_id)
  }

  fn visit_package(&mut self, id: PackageId) -> Result<(), BuildError> {
    if !self.packages.insert(id) {
      return Ok(());
    }
    let package = self.provider.package(id).ok_or(BuildError::UnknownPackage(id))?;

    for kind in [
      DependencyKind::Build,
      DependencyKind::Tool,
      DependencyKind::Runtime,
      DependencyKind::Other,
    ] {
      for child in package.children(kind) {
        match child.target {
          ChildRef::Subgraph(graph) => self.visit_graph(graph)?,
          ChildRef::InGraph(package) => self.visit_package(package)?,
        }
      }
    }

    self.order.push(package);
    Ok(())
  }
}

/// Empty `path`, creating it if needed.
fn reset_directory(path: &Path) -> Result<(), BuildError> {
  let directory_error = |source| BuildError::Directory {
    path: path.to_path_buf(),
    source,
  };
  match fs::remove_dir_all(path) {
    Ok(()) => {}
    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
    Err(e) => return Err(directory_error(e)),
  }
  fs::create_dir_all(path).map_err(directory_error)
}

/// Build `provider` with the file registry stored under `state_root`.
///
/// The registry is loaded once and saved once, after the last package, even
/// when the build fails.
pub async fn build<G: Generator, M: ProcessMonitor>(
  provider: &PackageProvider,
  state_root: &Path,
  generator: &G,
  monitor: Arc<M>,
  options: EvaluateOptions,
) -> Result<BuildSummary, BuildError> {
  let registry_path = registry_file(state_root);
  let registry = FileSystemRegistry::load_or_create(&registry_path).map_err(BuildError::Registry)?;

  let result = BuildRunner::new(provider, &registry, generator, monitor, options).run().await;

  let saved = registry.save(&registry_path);
  match (result, saved) {
    (Ok(summary), Ok(())) => Ok(summary),
    (Ok(_), Err(e)) => Err(BuildError::Registry(e)),
    (Err(e), saved) => {
      if let Err(save_error) = saved {
        warn!(path = %registry_path.display(), error = %save_error, "Failed to save file system state");
      }
      Err(e)
    }
  }
}
