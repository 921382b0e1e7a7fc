//! Shared test helpers for CLI integration tests.

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use soup_lib::fs_state::FileSystemRegistry;
use soup_lib::operation::{OperationGraph, OperationId, OperationInfo, encode_operation_graph};
use tempfile::TempDir;

/// Isolated test environment.
///
/// Each test gets its own temporary directory with isolated roots, state and
/// config paths.
pub struct TestEnv {
  pub temp: TempDir,
}

impl TestEnv {
  pub fn new() -> Self {
    Self {
      temp: TempDir::new().unwrap(),
    }
  }

  pub fn path(&self, relative: &str) -> PathBuf {
    self.temp.path().join(relative)
  }

  /// Write a file relative to the temp directory.
  pub fn write_file(&self, relative: &str, content: impl AsRef<[u8]>) -> PathBuf {
    let path = self.path(relative);
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
    path
  }

  pub fn state_root(&self) -> PathBuf {
    self.path("state")
  }

  /// Get a pre-configured Command for the soup binary.
  ///
  /// Sets environment variables for isolated testing:
  /// - `SOUP_ROOT`, `SOUP_BUILTIN_ROOT`, `SOUP_STATE_ROOT`: isolated roots
  /// - `XDG_CONFIG_HOME` / `APPDATA`: no user config file
  pub fn soup_cmd(&self) -> Command {
    let mut cmd: Command = cargo_bin_cmd!("soup");
    cmd.env("SOUP_ROOT", self.path("user"));
    cmd.env("SOUP_BUILTIN_ROOT", self.path("builtin"));
    cmd.env("SOUP_STATE_ROOT", self.state_root());
    cmd.env("XDG_CONFIG_HOME", self.path("config"));
    cmd.env("APPDATA", self.path("config"));
    cmd.env_remove("RUST_LOG");
    cmd
  }

  /// A C++ package whose build extension is the built-in `Soup.Cpp`.
  pub fn write_package(&self, name: &str, runtime: &[&str]) -> PathBuf {
    let dependencies = runtime
      .iter()
      .map(|dependency| format!("\"../{dependency}\""))
      .collect::<Vec<_>>()
      .join(", ");
    self.write_file(
      &format!("{name}/Recipe.toml"),
      format!("Name = \"{name}\"\nLanguage = \"C++|0.8\"\n\n[Dependencies]\nRuntime = [{dependencies}]\n"),
    );
    self.path(name)
  }

  /// Generator script that copies a prepared graph into the state directory
  /// it is given. Returns the script path.
  pub fn write_generator(&self, graph: &OperationGraph) -> PathBuf {
    let registry = FileSystemRegistry::new(1);
    let bytes = encode_operation_graph(graph, &registry).unwrap();
    let prepared = self.write_file("generator/GenerateGraph.bog", bytes);
    self.write_file(
      "generator/generate.sh",
      format!("cp '{}' \"$1/GenerateGraph.bog\"\n", prepared.display()),
    )
  }
}

/// One operation that writes `out.txt` next to `marker`.
pub fn touch_graph(directory: &Path) -> OperationGraph {
  let mut operation = OperationInfo::new(OperationId(1), "Write output", "/bin/sh", directory);
  operation.arguments = vec!["-c".to_string(), "echo built > out.txt".to_string()];
  let mut graph = OperationGraph::new();
  graph.root_operation_ids.push(OperationId(1));
  graph.add_operation(operation).unwrap();
  graph
}
