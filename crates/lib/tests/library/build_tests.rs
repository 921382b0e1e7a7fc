//! Full load, generate and evaluate runs over a recipe tree.

use std::fs;
use std::sync::Arc;

use soup_lib::build::{BuildError, PackageStatePaths, build, registry_file};
use soup_lib::evaluate::{EvaluateOptions, PlainMonitor};
use soup_lib::fs_state::FileSystemRegistry;
use soup_lib::operation::{OperationId, read_operation_graph, read_operation_results};
use soup_lib::package::PackageProvider;
use soup_lib::value::{Value, read_value_table};

use super::common::{CopyGenerator, Workspace};

/// App with a runtime dependency on Lib; each copies its `input.txt`.
fn workspace() -> Workspace {
  let workspace = Workspace::new();
  workspace.write_recipe(
    "App",
    "Name = \"App\"\nLanguage = \"Text\"\n[Dependencies]\nRuntime = [\"../Lib\"]\n",
  );
  workspace.write_recipe("Lib", "Name = \"Lib\"\nLanguage = \"Text\"\n");
  workspace.write_file("App/input.txt", "app v1");
  workspace.write_file("Lib/input.txt", "lib v1");
  workspace
}

fn target_of<'p>(provider: &'p PackageProvider, name: &str) -> &'p std::path::Path {
  &provider
    .packages
    .values()
    .find(|p| p.name == name)
    .unwrap()
    .target_directory
}

async fn run(workspace: &Workspace) -> (PackageProvider, Result<soup_lib::build::BuildSummary, BuildError>) {
  let provider = workspace.load("App").unwrap();
  let result = build(
    &provider,
    workspace.state_root(),
    &CopyGenerator,
    Arc::new(PlainMonitor),
    EvaluateOptions::default(),
  )
  .await;
  (provider, result)
}

#[tokio::test]
async fn first_build_runs_every_operation() {
  let workspace = workspace();

  let (provider, result) = run(&workspace).await;
  let summary = result.unwrap();

  assert_eq!(summary.packages_built, 2);
  assert_eq!(summary.packages_prebuilt, 1);
  assert_eq!(summary.operations_executed, 2);
  assert_eq!(
    fs::read_to_string(target_of(&provider, "App").join("output.txt")).unwrap(),
    "app v1"
  );
  assert_eq!(
    fs::read_to_string(target_of(&provider, "Lib").join("output.txt")).unwrap(),
    "lib v1"
  );
}

#[tokio::test]
async fn build_state_is_written_per_package() {
  let workspace = workspace();

  let (provider, result) = run(&workspace).await;
  result.unwrap();

  let registry = FileSystemRegistry::load_or_create(&registry_file(workspace.state_root())).unwrap();
  assert!(!registry.is_empty());

  let paths = PackageStatePaths::new(target_of(&provider, "App"));
  let input = read_value_table(&paths.generate_input).unwrap();
  assert_eq!(input["PackageName"], Value::from("App"));
  assert!(input.contains_key("Dependencies"));

  let graph = read_operation_graph(&paths.operation_graph, &registry).unwrap().unwrap();
  assert_eq!(graph.root_operation_ids, vec![OperationId(1)]);
  let results = read_operation_results(&paths.operation_results, &registry).unwrap().unwrap();
  assert!(results[&OperationId(1)].was_successful);
}

#[tokio::test]
async fn second_build_is_up_to_date() {
  let workspace = workspace();
  run(&workspace).await.1.unwrap();

  let (_, result) = run(&workspace).await;
  let summary = result.unwrap();

  assert_eq!(summary.operations_executed, 0);
  assert_eq!(summary.operations_up_to_date, 2);
}

#[tokio::test]
async fn changed_input_reruns_only_its_package() {
  let workspace = workspace();
  run(&workspace).await.1.unwrap();

  workspace.write_file("Lib/input.txt", "lib v2");
  let (provider, result) = run(&workspace).await;
  let summary = result.unwrap();

  assert_eq!(summary.operations_executed, 1);
  assert_eq!(summary.operations_up_to_date, 1);
  assert_eq!(
    fs::read_to_string(target_of(&provider, "Lib").join("output.txt")).unwrap(),
    "lib v2"
  );
}

#[tokio::test]
async fn deleted_output_is_rebuilt() {
  let workspace = workspace();
  let (provider, result) = run(&workspace).await;
  result.unwrap();

  fs::remove_file(target_of(&provider, "App").join("output.txt")).unwrap();
  let (_, result) = run(&workspace).await;

  assert_eq!(result.unwrap().operations_executed, 1);
}

#[tokio::test]
async fn failing_dependency_stops_before_dependents() {
  let workspace = workspace();
  fs::remove_file(workspace.path("Lib/input.txt")).unwrap();

  let (provider, result) = run(&workspace).await;

  let err = result.unwrap_err();
  assert!(matches!(&err, BuildError::Evaluate { package, .. } if package == "Lib"));
  assert!(!target_of(&provider, "App").join("output.txt").exists());

  // The failure is recorded so the next build retries it.
  let registry = FileSystemRegistry::load_or_create(&registry_file(workspace.state_root())).unwrap();
  let paths = PackageStatePaths::new(target_of(&provider, "Lib"));
  let results = read_operation_results(&paths.operation_results, &registry).unwrap().unwrap();
  assert!(!results[&OperationId(1)].was_successful);
}
