//! Implementation of the `soup graph` command.

use std::path::Path;

use anyhow::Result;
use owo_colors::{OwoColorize, Stream};

use soup_lib::package::{ChildRef, DependencyKind, PackageGraph, PackageProvider};
use soup_lib::value::Value;

use super::{TargetArgs, load_packages};
use crate::output::{package_line, print_dependency, print_json, print_stat, symbols};

pub fn cmd_graph(path: &Path, target: &TargetArgs, json: bool) -> Result<()> {
  let (_, provider) = load_packages(path, target)?;

  if json {
    return print_json(&provider);
  }

  for graph in provider.graphs.values() {
    print_graph(&provider, graph);
  }
  Ok(())
}

fn print_graph(provider: &PackageProvider, graph: &PackageGraph) {
  let root = if graph.id == provider.root_graph_id {
    " (root)"
  } else {
    ""
  };
  println!(
    "{}{}",
    format!("Graph {}", graph.id).if_supports_color(Stream::Stdout, |s| s.bold()),
    root
  );
  let parameters = graph
    .global_parameters
    .iter()
    .map(|(key, value)| format!("{key}={}", render(value)))
    .collect::<Vec<_>>()
    .join(" ");
  print_stat("Parameters", &parameters);

  for package in provider.packages_in_graph(graph.id) {
    let version = package.version.map(|v| v.to_string());
    println!(
      "  {} {}",
      symbols::INFO,
      package_line(&package.name, version.as_deref(), package.is_prebuilt)
    );
    print_stat("  Target", &package.target_directory.display().to_string());

    for kind in [
      DependencyKind::Build,
      DependencyKind::Tool,
      DependencyKind::Runtime,
      DependencyKind::Other,
    ] {
      for child in package.children(kind) {
        let target = match child.target {
          ChildRef::InGraph(id) => provider
            .package(id)
            .map(|p| p.name.clone())
            .unwrap_or_else(|| id.to_string()),
          ChildRef::Subgraph(id) => format!("graph {id}"),
        };
        print_dependency(kind, &child.reference.to_string(), &target);
      }
    }
  }
  println!();
}

fn render(value: &Value) -> String {
  match value.as_str() {
    Some(text) => text.to_string(),
    None => serde_json::to_string(value).unwrap_or_default(),
  }
}
