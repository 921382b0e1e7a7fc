//! The generate phase: turning a package into an operation graph.
//!
//! Before a package is evaluated, its build extension is asked for the
//! operations that build it. The request is written as `GenerateInput.bvt`
//! next to the package's other state files; a [`Generator`] answers it with an
//! [`OperationGraph`].

use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::build::PackageStatePaths;
use crate::codec::CodecError;
use crate::fs_state::FileSystemRegistry;
use crate::operation::{OperationGraph, OperationGraphError, read_operation_graph};
use crate::lock::lock_key;
use crate::package::{ChildRef, PackageInfo, PackageProvider, PackageReference};
use crate::value::{Value, ValueTable};

#[derive(Debug, Error)]
pub enum GenerateError {
  #[error("failed to start generator '{}': {source}", executable.display())]
  Spawn {
    executable: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("generator for {package} failed with exit code {code:?}")]
  Failed { package: String, code: Option<i32> },

  #[error("generator for {package} did not write {}", path.display())]
  MissingGraph { package: String, path: PathBuf },

  #[error("generated graph is invalid: {0}")]
  InvalidGraph(#[from] OperationGraphError),

  #[error(transparent)]
  Codec(#[from] CodecError),
}

/// Everything a generator needs to describe one package's build.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
  pub package_name: String,
  pub package_directory: PathBuf,
  pub target_directory: PathBuf,
  pub soup_directory: PathBuf,
  /// Already written to `GenerateInput.bvt` in the soup directory.
  pub input: ValueTable,
}

/// Produces the operation graph of a package.
pub trait Generator {
  fn generate(
    &self,
    request: &GenerateRequest,
    registry: &FileSystemRegistry,
  ) -> impl Future<Output = Result<OperationGraph, GenerateError>> + Send;
}

/// Runs an external generator executable.
///
/// The executable receives the soup directory as its last argument, reads
/// `GenerateInput.bvt` from it and writes `GenerateGraph.bog` back.
#[derive(Debug, Clone)]
pub struct ProcessGenerator {
  executable: PathBuf,
  arguments: Vec<String>,
}

impl ProcessGenerator {
  pub fn new(executable: impl Into<PathBuf>) -> Self {
    Self {
      executable: executable.into(),
      arguments: Vec::new(),
    }
  }

  pub fn with_arguments<I, S>(mut self, arguments: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.arguments = arguments.into_iter().map(Into::into).collect();
    self
  }
}

impl Generator for ProcessGenerator {
  async fn generate(
    &self,
    request: &GenerateRequest,
    registry: &FileSystemRegistry,
  ) -> Result<OperationGraph, GenerateError> {
    let graph_path = PackageStatePaths::new(&request.target_directory).generate_graph;
    info!(package = %request.package_name, generator = %self.executable.display(), "Generate");

    // A graph left by an earlier run must not stand in for this one.
    match tokio::fs::remove_file(&graph_path).await {
      Ok(()) => debug!(path = %graph_path.display(), "Removed previous generate graph"),
      Err(e) if e.kind() == io::ErrorKind::NotFound => {}
      Err(e) => return Err(GenerateError::Codec(CodecError::Io(e))),
    }

    let output = Command::new(&self.executable)
      .args(&self.arguments)
      .arg(&request.soup_directory)
      .current_dir(&request.package_directory)
      .stdin(Stdio::null())
      .kill_on_drop(true)
      .output()
      .await
      .map_err(|source| GenerateError::Spawn {
        executable: self.executable.clone(),
        source,
      })?;

    if !output.status.success() {
      let stderr = String::from_utf8_lossy(&output.stderr);
      if !stderr.trim().is_empty() {
        warn!(stderr = %stderr.trim(), "generator stderr");
      }
      return Err(GenerateError::Failed {
        package: request.package_name.clone(),
        code: output.status.code(),
      });
    }

    read_operation_graph(&graph_path, registry)?.ok_or_else(|| GenerateError::MissingGraph {
      package: request.package_name.clone(),
      path: graph_path,
    })
  }
}

fn path_value(path: &Path) -> Value {
  Value::String(path.to_string_lossy().into_owned())
}

/// Build the generate input for `package`.
///
/// The table carries the package's directories, the recipe, the graph's
/// global parameters, every dependency's directories by kind, and the paths
/// the package's operations may read and write.
pub fn build_generate_input(provider: &PackageProvider, package: &PackageInfo, paths: &PackageStatePaths) -> ValueTable {
  let mut input = ValueTable::new();

  input.insert("PackageName".to_string(), Value::from(package.name.as_str()));
  input.insert("Language".to_string(), Value::from(package.language.as_str()));
  input.insert("PackageDirectory".to_string(), path_value(&package.package_directory));
  input.insert("TargetDirectory".to_string(), path_value(&package.target_directory));
  input.insert("SoupTargetDirectory".to_string(), path_value(&paths.soup_directory));

  let global_parameters = provider
    .graph(package.graph_id)
    .map(|graph| graph.global_parameters.clone())
    .unwrap_or_default();
  input.insert("GlobalParameters".to_string(), Value::Table(global_parameters));

  let recipe = package
    .recipe
    .and_then(|id| provider.recipes.get(id))
    .map(|recipe| recipe.table.clone())
    .unwrap_or_default();
  input.insert("Recipe".to_string(), Value::Table(recipe));

  let mut read_access = vec![package.package_directory.clone()];
  let mut dependencies = ValueTable::new();
  for (kind, children) in &package.dependencies {
    let mut by_name = ValueTable::new();
    for child in children {
      let Some(dependency) = resolve_child(provider, child.target) else {
        warn!(reference = %child.reference, "Dependency missing from package provider");
        continue;
      };
      read_access.push(dependency.target_directory.clone());

      let mut entry = ValueTable::new();
      entry.insert("Reference".to_string(), Value::String(child.reference.to_string()));
      entry.insert("PackageDirectory".to_string(), path_value(&dependency.package_directory));
      entry.insert("TargetDirectory".to_string(), path_value(&dependency.target_directory));
      entry.insert(
        "SoupTargetDirectory".to_string(),
        path_value(&PackageStatePaths::new(&dependency.target_directory).soup_directory),
      );
      let mut key = dependency_key(&child.reference, &dependency.name);
      if by_name.contains_key(&key) {
        warn!(key = %key, reference = %child.reference, "Dependency name collides, keying by reference");
        key = child.reference.to_string();
      }
      by_name.insert(key, Value::Table(entry));
    }
    dependencies.insert(kind.as_str().to_string(), Value::Table(by_name));
  }
  input.insert("Dependencies".to_string(), Value::Table(dependencies));

  read_access.sort();
  read_access.dedup();
  input.insert(
    "EvaluateReadAccess".to_string(),
    Value::string_list(read_access.iter().map(|p| p.to_string_lossy().into_owned())),
  );
  input.insert(
    "EvaluateWriteAccess".to_string(),
    Value::string_list([package.target_directory.to_string_lossy().into_owned()]),
  );

  debug!(package = %package.name, keys = input.len(), "Generate input built");
  input
}

/// Dependencies are keyed by name, qualified with the owner when the
/// reference names one.
fn dependency_key(reference: &PackageReference, name: &str) -> String {
  match reference {
    PackageReference::Named { owner: Some(owner), .. } => lock_key(Some(owner.as_str()), name),
    _ => name.to_string(),
  }
}

fn resolve_child(provider: &PackageProvider, target: ChildRef) -> Option<&PackageInfo> {
  match target {
    ChildRef::InGraph(id) => provider.package(id),
    ChildRef::Subgraph(graph_id) => provider.package(provider.graph(graph_id)?.root_package_id),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::fs_state::FileSystemRegistry;
  use crate::operation::{OperationId, OperationInfo, write_operation_graph};
  use crate::package::{
    DependencyKind, PackageChildInfo, PackageGraph, PackageGraphId, PackageId, PackageReference, SemanticVersion,
  };
  use crate::recipe::RecipeCache;
  use std::collections::BTreeMap;
  use tempfile::TempDir;

  fn package(id: u32, graph: u32, name: &str, dir: &str) -> PackageInfo {
    PackageInfo {
      id: PackageId(id),
      graph_id: PackageGraphId(graph),
      name: name.to_string(),
      language: "C++".to_string(),
      version: Some(SemanticVersion::new(1, 0, 0)),
      is_prebuilt: false,
      package_directory: PathBuf::from(dir),
      target_directory: PathBuf::from(dir).join("out/hash"),
      recipe: None,
      dependencies: BTreeMap::new(),
    }
  }

  fn provider() -> PackageProvider {
    let mut app = package(1, 1, "App", "/work/App");
    app.dependencies.insert(
      DependencyKind::Runtime,
      vec![PackageChildInfo {
        reference: PackageReference::local("../Lib"),
        target: ChildRef::InGraph(PackageId(2)),
      }],
    );
    app.dependencies.insert(
      DependencyKind::Build,
      vec![PackageChildInfo {
        reference: PackageReference::named("Soup.Cpp"),
        target: ChildRef::Subgraph(PackageGraphId(2)),
      }],
    );
    let lib = package(2, 1, "Lib", "/work/Lib");
    let mut extension = package(3, 2, "Soup.Cpp", "/builtin/Wren/Soup.Cpp/0.8.2");
    extension.target_directory = extension.package_directory.clone();

    let mut parameters = ValueTable::new();
    parameters.insert("Flavor".to_string(), Value::from("Debug"));

    PackageProvider {
      root_graph_id: PackageGraphId(1),
      graphs: BTreeMap::from([
        (
          PackageGraphId(1),
          PackageGraph {
            id: PackageGraphId(1),
            root_package_id: PackageId(1),
            global_parameters: parameters,
          },
        ),
        (
          PackageGraphId(2),
          PackageGraph {
            id: PackageGraphId(2),
            root_package_id: PackageId(3),
            global_parameters: ValueTable::new(),
          },
        ),
      ]),
      packages: BTreeMap::from([(PackageId(1), app), (PackageId(2), lib), (PackageId(3), extension)]),
      recipes: RecipeCache::new(),
    }
  }

  #[test]
  fn input_describes_package_and_dependencies() {
    let provider = provider();
    let app = provider.package(PackageId(1)).unwrap();
    let paths = PackageStatePaths::new(&app.target_directory);

    let input = build_generate_input(&provider, app, &paths);

    assert_eq!(input["PackageDirectory"], Value::from("/work/App"));
    assert_eq!(input["SoupTargetDirectory"], Value::from("/work/App/out/hash/.soup"));
    assert_eq!(input["GlobalParameters"].as_table().unwrap()["Flavor"], Value::from("Debug"));

    let dependencies = input["Dependencies"].as_table().unwrap();
    let lib = dependencies["Runtime"].as_table().unwrap()["Lib"].as_table().unwrap();
    assert_eq!(lib["TargetDirectory"], Value::from("/work/Lib/out/hash"));
    assert_eq!(lib["Reference"], Value::from("../Lib"));
    let extension = dependencies["Build"].as_table().unwrap()["Soup.Cpp"].as_table().unwrap();
    assert_eq!(extension["TargetDirectory"], Value::from("/builtin/Wren/Soup.Cpp/0.8.2"));

    let read = input["EvaluateReadAccess"].as_list().unwrap();
    assert_eq!(read.len(), 3);
    assert_eq!(
      input["EvaluateWriteAccess"],
      Value::string_list(["/work/App/out/hash"])
    );
  }

  #[test]
  fn same_named_dependencies_from_different_owners_are_kept() {
    let mut provider = provider();
    let named = |owner: &str| PackageReference::Named {
      language: None,
      owner: Some(owner.to_string()),
      name: "Json".to_string(),
      version: None,
    };
    provider.packages.insert(PackageId(4), package(4, 1, "Json", "/user/packages/C++/Alice/Json/1.0.0"));
    provider.packages.insert(PackageId(5), package(5, 1, "Json", "/user/packages/C++/Bob/Json/2.0.0"));
    let app = provider.packages.get_mut(&PackageId(1)).unwrap();
    app.dependencies.insert(
      DependencyKind::Other,
      vec![
        PackageChildInfo {
          reference: named("Alice"),
          target: ChildRef::InGraph(PackageId(4)),
        },
        PackageChildInfo {
          reference: named("Bob"),
          target: ChildRef::InGraph(PackageId(5)),
        },
      ],
    );
    let app = provider.package(PackageId(1)).unwrap();

    let input = build_generate_input(&provider, app, &PackageStatePaths::new(&app.target_directory));

    let other = input["Dependencies"].as_table().unwrap()["Other"].as_table().unwrap();
    assert_eq!(other.len(), 2);
    let bob = other["Bob|Json"].as_table().unwrap();
    assert_eq!(bob["PackageDirectory"], Value::from("/user/packages/C++/Bob/Json/2.0.0"));
    assert_eq!(other["Alice|Json"].as_table().unwrap()["Reference"], Value::from("Alice|Json"));
  }

  #[cfg(unix)]
  #[tokio::test]
  async fn process_generator_reads_written_graph() {
    let temp = TempDir::new().unwrap();
    let target = temp.path().join("out");
    let paths = PackageStatePaths::new(&target);
    std::fs::create_dir_all(&paths.soup_directory).unwrap();

    // A prepared graph stands in for the one a real generator would write.
    let registry = FileSystemRegistry::new(1);
    let mut graph = OperationGraph::new();
    graph.root_operation_ids.push(OperationId(1));
    graph
      .add_operation(OperationInfo::new(OperationId(1), "compile", "cc", temp.path()))
      .unwrap();
    let prepared = temp.path().join("prepared.bog");
    write_operation_graph(&prepared, &graph, &registry).unwrap();

    let script = format!("cp '{}' \"$0/GenerateGraph.bog\"", prepared.display());
    let generator = ProcessGenerator::new("/bin/sh").with_arguments(["-c", script.as_str()]);
    let request = GenerateRequest {
      package_name: "App".to_string(),
      package_directory: temp.path().to_path_buf(),
      target_directory: target.clone(),
      soup_directory: paths.soup_directory.clone(),
      input: ValueTable::new(),
    };

    let generated = generator.generate(&request, &registry).await.unwrap();

    assert_eq!(generated, graph);
  }

  #[cfg(unix)]
  #[tokio::test]
  async fn process_generator_without_output_fails() {
    let temp = TempDir::new().unwrap();
    let target = temp.path().join("out");
    let paths = PackageStatePaths::new(&target);
    // Left over from an earlier run.
    std::fs::create_dir_all(&paths.soup_directory).unwrap();
    write_operation_graph(&paths.generate_graph, &OperationGraph::new(), &FileSystemRegistry::new(1)).unwrap();
    let generator = ProcessGenerator::new("/bin/sh").with_arguments(["-c", "true"]);
    let request = GenerateRequest {
      package_name: "App".to_string(),
      package_directory: temp.path().to_path_buf(),
      target_directory: target,
      soup_directory: paths.soup_directory,
      input: ValueTable::new(),
    };

    let err = generator.generate(&request, &FileSystemRegistry::new(1)).await.unwrap_err();

    assert!(matches!(err, GenerateError::MissingGraph { .. }));
  }
}
