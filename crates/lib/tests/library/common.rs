//! Shared helpers for soup-lib integration tests.

use std::fs;
use std::path::{Path, PathBuf};

use soup_lib::config::{LanguageConfig, SoupConfig, SoupRoots};
use soup_lib::consts::{LOCK_FILENAME, RECIPE_FILENAME};
use soup_lib::fs_state::FileSystemRegistry;
use soup_lib::generate::{GenerateError, GenerateRequest, Generator};
use soup_lib::language::LanguageRegistry;
use soup_lib::load::{LoadError, LoadOptions, PackageLoader};
use soup_lib::lock::PackageLock;
use soup_lib::operation::{OperationGraph, OperationId, OperationInfo};
use soup_lib::package::{PackageProvider, SemanticVersion};
use soup_lib::value::{Value, ValueTable};
use tempfile::TempDir;

/// Isolated set of roots and package directories.
pub struct Workspace {
  pub temp: TempDir,
  pub config: SoupConfig,
}

impl Workspace {
  /// Roots under a fresh temp directory, plus a test language `Text` whose
  /// build extension `Soup.Text` is a built-in host package.
  pub fn new() -> Self {
    let temp = TempDir::new().unwrap();
    let roots = SoupRoots {
      user_root: temp.path().join("user"),
      builtin_root: temp.path().join("builtin"),
      state_root: temp.path().join("state"),
    };
    let mut config = SoupConfig::with_roots(roots);
    config.languages.insert(
      "Text".to_string(),
      LanguageConfig {
        extension: "Soup.Text".to_string(),
      },
    );
    config
      .builtin
      .entry(config.host_language.clone())
      .or_default()
      .insert("Soup.Text".to_string(), SemanticVersion::new(1, 0, 0));
    Self { temp, config }
  }

  pub fn path(&self, relative: &str) -> PathBuf {
    self.temp.path().join(relative)
  }

  pub fn state_root(&self) -> &Path {
    &self.config.roots.state_root
  }

  pub fn write_file(&self, relative: &str, content: &str) -> PathBuf {
    let path = self.path(relative);
    if let Some(parent) = path.parent() {
      fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, content).unwrap();
    path
  }

  pub fn write_recipe(&self, directory: &str, content: &str) -> PathBuf {
    self.write_file(&format!("{directory}/{RECIPE_FILENAME}"), content);
    self.path(directory)
  }

  pub fn write_lock(&self, directory: &str, lock: &PackageLock) {
    lock.save(&self.path(directory).join(LOCK_FILENAME)).unwrap();
  }

  pub fn load(&self, directory: &str) -> Result<PackageProvider, LoadError> {
    let languages = LanguageRegistry::from_config(&self.config);
    let options = LoadOptions {
      target_parameters: parameters("Debug"),
      host_parameters: parameters("Release"),
    };
    PackageLoader::new(&self.config, &languages, options).load(&self.path(directory))
  }
}

pub fn parameters(flavor: &str) -> ValueTable {
  let mut table = ValueTable::new();
  table.insert("Flavor".to_string(), Value::from(flavor));
  table
}

/// Generates one operation per package that copies `input.txt` from the
/// package directory to `output.txt` in the target directory.
pub struct CopyGenerator;

impl Generator for CopyGenerator {
  async fn generate(
    &self,
    request: &GenerateRequest,
    registry: &FileSystemRegistry,
  ) -> Result<OperationGraph, GenerateError> {
    let input = request.package_directory.join("input.txt");
    let output = request.target_directory.join("output.txt");

    let mut operation = OperationInfo::new(
      OperationId(1),
      format!("Copy {}", request.package_name),
      "/bin/sh",
      &request.package_directory,
    );
    operation.arguments = vec![
      "-c".to_string(),
      format!("cp '{}' '{}'", input.display(), output.display()),
    ];
    operation.declared_input.insert(registry.to_file_id(&input));
    operation.declared_output.insert(registry.to_file_id(&output));
    operation.declared_read_access.insert(request.package_directory.clone());
    operation.declared_write_access.insert(request.target_directory.clone());

    let mut graph = OperationGraph::new();
    graph.root_operation_ids.push(OperationId(1));
    graph.add_operation(operation)?;
    Ok(graph)
  }
}
