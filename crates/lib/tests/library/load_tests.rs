//! Loading recipe trees from disk.

use soup_lib::load::LoadError;
use soup_lib::lock::{LockEntry, PackageLock, ROOT_CLOSURE};
use soup_lib::package::{ChildRef, DependencyKind, PackageInfo, PackageProvider, SemanticVersion};
use soup_lib::value::Value;

use super::common::Workspace;

fn named<'p>(provider: &'p PackageProvider, name: &str) -> Vec<&'p PackageInfo> {
  provider.packages.values().filter(|p| p.name == name).collect()
}

fn only<'p>(provider: &'p PackageProvider, name: &str) -> &'p PackageInfo {
  let packages = named(provider, name);
  assert_eq!(packages.len(), 1, "expected exactly one {name}");
  packages[0]
}

mod graphs {
  use super::*;

  /// App -> runtime Lib, App -> tool Gen, all in language Text.
  fn write_tree(workspace: &Workspace) {
    workspace.write_recipe(
      "App",
      r#"
Name = "App"
Language = "Text|1"
Version = "1.2.3"

[Dependencies]
Runtime = ["../Lib"]
Tool = ["../Gen"]
"#,
    );
    workspace.write_recipe("Lib", "Name = \"Lib\"\nLanguage = \"Text\"\n");
    workspace.write_recipe("Gen", "Name = \"Gen\"\nLanguage = \"Text\"\n");
  }

  #[test]
  fn runtime_stays_in_graph_and_tool_gets_host_graph() {
    let workspace = Workspace::new();
    write_tree(&workspace);

    let provider = workspace.load("App").unwrap();

    let app = only(&provider, "App");
    let lib = only(&provider, "Lib");
    let tool = only(&provider, "Gen");
    assert_eq!(app.version, Some(SemanticVersion::new(1, 2, 3)));
    assert_eq!(app.graph_id, provider.root_graph_id);
    assert_eq!(lib.graph_id, provider.root_graph_id);
    assert_ne!(tool.graph_id, provider.root_graph_id);

    assert_eq!(app.children(DependencyKind::Runtime)[0].target, ChildRef::InGraph(lib.id));
    assert_eq!(app.children(DependencyKind::Tool)[0].target, ChildRef::Subgraph(tool.graph_id));

    let tool_graph = provider.graph(tool.graph_id).unwrap();
    assert_eq!(tool_graph.global_parameters["Flavor"], Value::from("Release"));
    let root_graph = provider.root_graph().unwrap();
    assert_eq!(root_graph.global_parameters["Flavor"], Value::from("Debug"));
  }

  #[test]
  fn extension_graph_is_shared() {
    let workspace = Workspace::new();
    write_tree(&workspace);

    let provider = workspace.load("App").unwrap();

    let extension = only(&provider, "Soup.Text");
    assert!(extension.is_prebuilt);
    for name in ["App", "Lib", "Gen"] {
      let build = only(&provider, name).children(DependencyKind::Build);
      assert_eq!(build.len(), 1, "{name} depends on its extension");
      assert_eq!(build[0].target, ChildRef::Subgraph(extension.graph_id));
    }
    // Root, tool and extension graphs.
    assert_eq!(provider.graphs.len(), 3);
  }

  #[test]
  fn target_directories_differ_by_parameters() {
    let workspace = Workspace::new();
    write_tree(&workspace);

    let provider = workspace.load("App").unwrap();

    let app = only(&provider, "App");
    let tool = only(&provider, "Gen");
    assert!(app.target_directory.starts_with(&app.package_directory));
    assert!(tool.target_directory.starts_with(&tool.package_directory));
    assert_ne!(
      app.target_directory.file_name(),
      tool.target_directory.file_name(),
      "Debug and Release builds use different parameter hashes"
    );
  }

  #[test]
  fn same_directory_through_two_spellings_loads_once() {
    let workspace = Workspace::new();
    workspace.write_recipe(
      "App",
      "Name = \"App\"\nLanguage = \"Text\"\n[Dependencies]\nRuntime = [\"../Lib\", \"../Other/../Lib\"]\n",
    );
    workspace.write_recipe("Lib", "Name = \"Lib\"\nLanguage = \"Text\"\n");
    std::fs::create_dir_all(workspace.path("Other")).unwrap();

    let provider = workspace.load("App").unwrap();

    assert_eq!(named(&provider, "Lib").len(), 1);
  }
}

mod cache {
  use super::*;

  #[test]
  fn owned_reference_loads_from_package_cache() {
    let workspace = Workspace::new();
    workspace.write_recipe(
      "App",
      "Name = \"App\"\nLanguage = \"Text\"\n[Dependencies]\nRuntime = [\"[Text]Alice|Json@3.1.0\"]\n",
    );
    workspace.write_recipe("user/packages/Text/Alice/Json/3.1.0", "Name = \"Json\"\nLanguage = \"Text\"\n");

    let provider = workspace.load("App").unwrap();

    let json = only(&provider, "Json");
    assert_eq!(json.version, Some(SemanticVersion::new(3, 1, 0)));
    assert!(json.package_directory.ends_with("Text/Alice/Json/3.1.0"));
    assert!(json.target_directory.starts_with(workspace.path("user/out")));
  }

  #[test]
  fn lock_pins_owned_runtime_dependency() {
    let workspace = Workspace::new();
    workspace.write_recipe(
      "App",
      "Name = \"App\"\nLanguage = \"Text\"\n[Dependencies]\nRuntime = [\"Alice|Json\"]\n",
    );
    workspace.write_recipe("user/packages/Text/Alice/Json/2.0.0", "Name = \"Json\"\nLanguage = \"Text\"\n");
    let mut lock = PackageLock::new();
    lock.insert(ROOT_CLOSURE, "Text", "App".to_string(), LockEntry::new("./"));
    lock.insert(ROOT_CLOSURE, "Text", "Alice|Json".to_string(), LockEntry::new("2.0.0"));
    workspace.write_lock("App", &lock);

    let provider = workspace.load("App").unwrap();

    assert_eq!(only(&provider, "Json").version, Some(SemanticVersion::new(2, 0, 0)));
  }

  #[test]
  fn owned_reference_without_version_or_lock_fails() {
    let workspace = Workspace::new();
    workspace.write_recipe(
      "App",
      "Name = \"App\"\nLanguage = \"Text\"\n[Dependencies]\nRuntime = [\"Alice|Json\"]\n",
    );

    let err = workspace.load("App").unwrap_err();

    assert!(err.to_string().contains("Alice|Json"), "unexpected error: {err}");
  }

  /// App pins `Alice|Json` to 2.0.0 and depends on Lib, which uses
  /// `Alice|Json` without a version and has its own lock.
  fn write_nested_locks(workspace: &Workspace, lib_pin: Option<&str>) {
    workspace.write_recipe(
      "App",
      "Name = \"App\"\nLanguage = \"Text\"\n[Dependencies]\nRuntime = [\"../Lib\"]\n",
    );
    workspace.write_recipe(
      "Lib",
      "Name = \"Lib\"\nLanguage = \"Text\"\n[Dependencies]\nRuntime = [\"Alice|Json\"]\n",
    );
    workspace.write_recipe("user/packages/Text/Alice/Json/2.0.0", "Name = \"Json\"\nLanguage = \"Text\"\n");
    workspace.write_recipe("user/packages/Text/Alice/Json/3.1.0", "Name = \"Json\"\nLanguage = \"Text\"\n");

    let mut app_lock = PackageLock::new();
    app_lock.insert(ROOT_CLOSURE, "Text", "App".to_string(), LockEntry::new("./"));
    app_lock.insert(ROOT_CLOSURE, "Text", "Lib".to_string(), LockEntry::new("../Lib/"));
    app_lock.insert(ROOT_CLOSURE, "Text", "Alice|Json".to_string(), LockEntry::new("2.0.0"));
    workspace.write_lock("App", &app_lock);

    let mut lib_lock = PackageLock::new();
    lib_lock.insert(ROOT_CLOSURE, "Text", "Lib".to_string(), LockEntry::new("./"));
    if let Some(version) = lib_pin {
      lib_lock.insert(ROOT_CLOSURE, "Text", "Alice|Json".to_string(), LockEntry::new(version));
    }
    workspace.write_lock("Lib", &lib_lock);
  }

  #[test]
  fn child_lock_replaces_parent_pins() {
    let workspace = Workspace::new();
    write_nested_locks(&workspace, Some("3.1.0"));

    let provider = workspace.load("App").unwrap();

    assert_eq!(only(&provider, "Json").version, Some(SemanticVersion::new(3, 1, 0)));
  }

  #[test]
  fn parent_pin_is_not_consulted_under_child_lock() {
    let workspace = Workspace::new();
    write_nested_locks(&workspace, None);

    let err = workspace.load("App").unwrap_err();

    assert!(err.to_string().contains("Alice|Json"), "unexpected error: {err}");
    assert!(
      matches!(err, LoadError::UnresolvedDependency { ref package, .. } if package.ends_with("Lib")),
      "unexpected error: {err}"
    );
  }
}
