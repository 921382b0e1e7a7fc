//! Build command integration tests.

#![cfg(unix)]

use predicates::prelude::*;

use super::common::{TestEnv, touch_graph};

fn prepared_env() -> TestEnv {
  let env = TestEnv::new();
  env.write_package("App", &["Lib"]);
  env.write_package("Lib", &[]);
  std::fs::create_dir_all(env.path("work")).unwrap();
  env.write_generator(&touch_graph(&env.path("work")));
  env
}

fn build_cmd(env: &TestEnv) -> assert_cmd::Command {
  let mut cmd = env.soup_cmd();
  cmd
    .arg("build")
    .arg(env.path("App"))
    .args(["--generator", "/bin/sh", "--generator-arg"])
    .arg(env.path("generator/generate.sh"));
  cmd
}

#[test]
fn build_runs_every_package() {
  let env = prepared_env();

  build_cmd(&env)
    .assert()
    .success()
    .stdout(predicate::str::contains("Build complete"))
    .stdout(predicate::str::contains("2 operations run"))
    .stdout(predicate::str::contains("Packages built: 2"))
    .stdout(predicate::str::contains("Packages prebuilt: 1"))
    .stdout(predicate::str::contains("Operations executed: 2"));

  assert_eq!(std::fs::read_to_string(env.path("work/out.txt")).unwrap(), "built\n");
  assert!(env.state_root().join("State").join("FileSystemState.bin").exists());
}

#[test]
fn second_build_is_up_to_date() {
  let env = prepared_env();
  build_cmd(&env).assert().success();

  build_cmd(&env)
    .assert()
    .success()
    .stdout(predicate::str::contains("Up to date"))
    .stdout(predicate::str::contains("Operations executed: 0"))
    .stdout(predicate::str::contains("Operations up to date: 2"));
}

#[test]
fn build_json_summary() {
  let env = prepared_env();

  let output = build_cmd(&env).arg("--json").output().unwrap();

  assert!(output.status.success());
  let summary: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  assert_eq!(summary["packages_built"], 2);
  assert_eq!(summary["operations_executed"], 2);
}

#[test]
fn failing_generator_fails_build() {
  let env = prepared_env();
  env.write_file("generator/generate.sh", "exit 3\n");

  build_cmd(&env)
    .assert()
    .failure()
    .stderr(predicate::str::contains("Build failed"))
    .stderr(predicate::str::contains("Lib"));
}

#[test]
fn failing_operation_fails_build() {
  let env = TestEnv::new();
  env.write_package("App", &[]);
  let mut graph = touch_graph(&env.path("App"));
  graph.operations.values_mut().for_each(|operation| {
    operation.arguments = vec!["-c".to_string(), "exit 7".to_string()];
  });
  env.write_generator(&graph);

  build_cmd(&env)
    .assert()
    .failure()
    .stderr(predicate::str::contains("failed to evaluate App"));
}
