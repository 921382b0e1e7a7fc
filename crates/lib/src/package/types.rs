use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use super::reference::PackageReference;
use super::version::SemanticVersion;
use crate::recipe::{RecipeCache, RecipeId};
use crate::value::ValueTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct PackageId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct PackageGraphId(pub u32);

impl fmt::Display for PackageId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

impl fmt::Display for PackageGraphId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// Role of a dependency edge.
///
/// `Build` and `Tool` dependencies run on the build host, so they live in
/// their own package graph with host parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum DependencyKind {
  Build,
  Tool,
  Runtime,
  Other,
}

impl DependencyKind {
  /// Map a recipe `[Dependencies]` key to a kind.
  pub fn from_key(key: &str) -> Self {
    match key {
      "Build" => Self::Build,
      "Tool" => Self::Tool,
      "Runtime" => Self::Runtime,
      _ => Self::Other,
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Build => "Build",
      Self::Tool => "Tool",
      Self::Runtime => "Runtime",
      Self::Other => "Other",
    }
  }

  pub fn crosses_graph(&self) -> bool {
    matches!(self, Self::Build | Self::Tool)
  }
}

impl fmt::Display for DependencyKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Where a dependency edge points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ChildRef {
  /// A package in the same graph.
  InGraph(PackageId),
  /// The root of another graph.
  Subgraph(PackageGraphId),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PackageChildInfo {
  pub reference: PackageReference,
  pub target: ChildRef,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PackageInfo {
  pub id: PackageId,
  pub graph_id: PackageGraphId,
  pub name: String,
  pub language: String,
  #[serde(serialize_with = "serialize_version")]
  pub version: Option<SemanticVersion>,
  /// Built-in packages ship ready to use and are never generated or evaluated.
  pub is_prebuilt: bool,
  pub package_directory: PathBuf,
  pub target_directory: PathBuf,
  #[serde(skip)]
  pub recipe: Option<RecipeId>,
  pub dependencies: BTreeMap<DependencyKind, Vec<PackageChildInfo>>,
}

impl PackageInfo {
  pub fn children(&self, kind: DependencyKind) -> &[PackageChildInfo] {
    self.dependencies.get(&kind).map(Vec::as_slice).unwrap_or_default()
  }
}

fn serialize_version<S: serde::Serializer>(
  version: &Option<SemanticVersion>,
  serializer: S,
) -> Result<S::Ok, S::Error> {
  match version {
    Some(version) => serializer.collect_str(version),
    None => serializer.serialize_none(),
  }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PackageGraph {
  pub id: PackageGraphId,
  pub root_package_id: PackageId,
  pub global_parameters: ValueTable,
}

/// Everything one load produced.
#[derive(Debug, Serialize)]
pub struct PackageProvider {
  pub root_graph_id: PackageGraphId,
  pub graphs: BTreeMap<PackageGraphId, PackageGraph>,
  pub packages: BTreeMap<PackageId, PackageInfo>,
  #[serde(skip)]
  pub recipes: RecipeCache,
}

impl PackageProvider {
  pub fn root_graph(&self) -> Option<&PackageGraph> {
    self.graphs.get(&self.root_graph_id)
  }

  pub fn graph(&self, id: PackageGraphId) -> Option<&PackageGraph> {
    self.graphs.get(&id)
  }

  pub fn package(&self, id: PackageId) -> Option<&PackageInfo> {
    self.packages.get(&id)
  }

  /// All packages belonging to one graph, in id order.
  pub fn packages_in_graph(&self, graph_id: PackageGraphId) -> impl Iterator<Item = &PackageInfo> {
    self.packages.values().filter(move |p| p.graph_id == graph_id)
  }
}
