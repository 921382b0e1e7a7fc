//! Inspect command integration tests.

use std::collections::BTreeMap;
use std::time::SystemTime;

use predicates::prelude::*;
use soup_lib::fs_state::FileSystemRegistry;
use soup_lib::operation::{OperationId, OperationResult, OperationResults, write_operation_results};
use soup_lib::value::{Value, ValueTable, write_value_table};

use super::common::{TestEnv, touch_graph};

#[test]
fn inspect_value_table() {
  let env = TestEnv::new();
  let mut table = ValueTable::new();
  table.insert("PackageName".to_string(), Value::from("App"));
  table.insert("Jobs".to_string(), Value::from(4_i64));
  let file = env.path("GenerateInput.bvt");
  write_value_table(&file, &table).unwrap();

  env
    .soup_cmd()
    .arg("inspect")
    .arg(&file)
    .assert()
    .success()
    .stdout(predicate::str::contains("value table"))
    .stdout(predicate::str::contains("PackageName: App"))
    .stdout(predicate::str::contains("Jobs: 4"));
}

#[test]
fn inspect_operation_graph_as_json() {
  let env = TestEnv::new();
  let graph = env.write_generator(&touch_graph(&env.path("work")));
  let file = graph.with_file_name("GenerateGraph.bog");

  let output = env.soup_cmd().arg("inspect").arg(&file).arg("--json").output().unwrap();

  assert!(output.status.success());
  let document: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  assert_eq!(document["root_operation_ids"], serde_json::json!([1]));
  assert_eq!(document["operations"][0]["title"], "Write output");
  assert_eq!(document["operations"][0]["command"], "/bin/sh");
}

#[test]
fn inspect_results_shows_paths() {
  let env = TestEnv::new();
  let registry = FileSystemRegistry::new(1);
  let output_file = env.path("work/out.txt");
  let result = OperationResult {
    was_successful: true,
    evaluate_time: SystemTime::now(),
    observed_input: Default::default(),
    observed_output: [registry.to_file_id(&output_file)].into_iter().collect(),
  };
  let results: OperationResults = BTreeMap::from([(OperationId(3), result)]);
  let file = env.path("OperationResults.bor");
  write_operation_results(&file, &results, &registry).unwrap();

  env
    .soup_cmd()
    .arg("inspect")
    .arg(&file)
    .assert()
    .success()
    .stdout(predicate::str::contains("operation results"))
    .stdout(predicate::str::contains("was_successful: true"))
    .stdout(predicate::str::contains(output_file.display().to_string()));
}

#[test]
fn inspect_truncated_file_fails() {
  let env = TestEnv::new();
  let file = env.write_file("broken.bor", b"BOR\0\x02\0");

  env
    .soup_cmd()
    .arg("inspect")
    .arg(&file)
    .assert()
    .failure()
    .stderr(predicate::str::contains("Failed to decode"));
}
