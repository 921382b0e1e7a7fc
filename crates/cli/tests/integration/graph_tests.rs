//! Graph command integration tests.

use predicates::prelude::*;

use super::common::TestEnv;

#[test]
fn graph_lists_packages_and_extension() {
  let env = TestEnv::new();
  env.write_package("App", &["Lib"]);
  env.write_package("Lib", &[]);

  env
    .soup_cmd()
    .arg("graph")
    .arg(env.path("App"))
    .assert()
    .success()
    .stdout(predicate::str::contains("(root)"))
    .stdout(predicate::str::contains("Lib"))
    .stdout(predicate::str::contains("Soup.Cpp 0.8.2 [prebuilt]"))
    .stdout(predicate::str::contains("Flavor=Debug"))
    .stdout(predicate::str::contains("Flavor=Release"));
}

#[test]
fn graph_json_describes_every_package() {
  let env = TestEnv::new();
  env.write_package("App", &["Lib"]);
  env.write_package("Lib", &[]);

  let output = env
    .soup_cmd()
    .args(["graph", "--json", "--flavor", "Profile", "--arch", "arm64"])
    .arg(env.path("App"))
    .output()
    .unwrap();

  assert!(output.status.success());
  let provider: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  let packages = provider["packages"].as_object().unwrap();
  assert_eq!(packages.len(), 3);

  let root = provider["root_graph_id"].to_string();
  let parameters = &provider["graphs"][&root]["global_parameters"];
  assert_eq!(parameters["Flavor"], "Profile");
  assert_eq!(parameters["Architecture"], "arm64");
}

#[test]
fn graph_reports_unknown_language() {
  let env = TestEnv::new();
  env.write_file("App/Recipe.toml", "Name = \"App\"\nLanguage = \"Cobol\"\n");

  env
    .soup_cmd()
    .arg("graph")
    .arg(env.path("App"))
    .assert()
    .failure()
    .stderr(predicate::str::contains("unknown language 'Cobol'"));
}
