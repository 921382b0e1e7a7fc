//! Package graph load engine.
//!
//! Starting from the recipe in a working directory, recursively resolves every
//! dependency into a [`PackageProvider`]: a set of package graphs, one per
//! distinct parameter context. Runtime dependencies stay in their parent's
//! graph; build and tool dependencies each root a graph of their own that is
//! built for the host.
//!
//! Loading is memoized twice. Within a graph, a package directory maps to one
//! [`PackageId`]; across graph-crossing edges, a package directory maps to one
//! [`PackageGraphId`]. Diamond and triangle shapes therefore load every
//! package once.

mod resolve;

use std::collections::{BTreeMap, HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::SoupConfig;
use crate::consts::{LOCK_FILENAME, RECIPE_FILENAME};
use crate::language::{LanguageRegistry, PackageLocation};
use crate::lock::{PackageLock, lock_key};
use crate::package::{
  ChildRef, DependencyKind, PackageChildInfo, PackageGraph, PackageGraphId, PackageId, PackageInfo,
  PackageProvider, PackageReference, SemanticVersion,
};
use crate::recipe::{RecipeCache, RecipeError};
use crate::util::hash::{HashError, Hashable};
use crate::value::ValueTable;
use resolve::{LockScope, ResolveContext, ResolvedPackage, canonical_directory, resolve_reference};

#[derive(Debug, Error)]
pub enum LoadError {
  #[error(transparent)]
  Manifest(#[from] RecipeError),

  #[error("unable to resolve a version for '{reference}' required by {}", package.display())]
  UnresolvedDependency { reference: String, package: PathBuf },

  #[error("lock file {} does not contain the package {language}|{name}", path.display())]
  LockMismatch {
    path: PathBuf,
    language: String,
    name: String,
  },

  #[error("unknown language '{language}' for package {package}")]
  UnknownLanguage { language: String, package: String },

  #[error("circular dependency on {}", path.display())]
  CircularDependency { path: PathBuf },

  #[error("failed to hash build parameters: {0}")]
  Parameters(#[source] HashError),

  #[error("invalid working directory {}: {source}", path.display())]
  WorkingDirectory {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

/// Parameters for the two kinds of package graph.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
  /// Parameters of the root graph.
  pub target_parameters: ValueTable,
  /// Parameters of every graph reached through a build or tool edge.
  pub host_parameters: ValueTable,
}

pub struct PackageLoader<'a> {
  config: &'a SoupConfig,
  languages: &'a LanguageRegistry,
  options: LoadOptions,
}

impl<'a> PackageLoader<'a> {
  pub fn new(config: &'a SoupConfig, languages: &'a LanguageRegistry, options: LoadOptions) -> Self {
    Self {
      config,
      languages,
      options,
    }
  }

  /// Load the package in `working_directory` and everything it depends on.
  pub fn load(&self, working_directory: &Path) -> Result<PackageProvider, LoadError> {
    let base = std::env::current_dir().map_err(|source| LoadError::WorkingDirectory {
      path: working_directory.to_path_buf(),
      source,
    })?;
    let directory = canonical_directory(&base, working_directory);
    info!(directory = %directory.display(), "Loading package graph");

    let mut state = LoadState::new(self);
    let root_graph_id = state.start_graph(self.options.target_parameters.clone())?;
    let root = ResolvedPackage {
      language: None,
      owner: None,
      location: PackageLocation::Local {
        directory: directory.clone(),
      },
      directory,
      version: None,
    };
    let root_package_id = state.load_package(root_graph_id, root, None)?;
    state.finish_graph(root_graph_id, root_package_id);

    debug!(
      graphs = state.graphs.len(),
      packages = state.packages.len(),
      recipes = state.recipes.len(),
      "Package graph loaded"
    );

    Ok(PackageProvider {
      root_graph_id,
      graphs: state.graphs,
      packages: state.packages,
      recipes: state.recipes,
    })
  }
}

/// Mutable bookkeeping for one load.
struct LoadState<'l, 'a> {
  loader: &'l PackageLoader<'a>,
  recipes: RecipeCache,
  graphs: BTreeMap<PackageGraphId, PackageGraph>,
  packages: BTreeMap<PackageId, PackageInfo>,
  /// Parameters and their hash for graphs still being loaded or finished.
  graph_parameters: HashMap<PackageGraphId, (ValueTable, String)>,
  /// Package directory to package, per graph.
  package_memo: HashMap<PackageGraphId, HashMap<PathBuf, PackageId>>,
  /// Package directory to graph, for graph-crossing edges.
  graph_memo: HashMap<PathBuf, PackageGraphId>,
  packages_in_progress: HashSet<(PackageGraphId, PathBuf)>,
  graphs_in_progress: HashSet<PathBuf>,
  next_graph_id: u32,
  next_package_id: u32,
}

impl<'l, 'a> LoadState<'l, 'a> {
  fn new(loader: &'l PackageLoader<'a>) -> Self {
    Self {
      loader,
      recipes: RecipeCache::new(),
      graphs: BTreeMap::new(),
      packages: BTreeMap::new(),
      graph_parameters: HashMap::new(),
      package_memo: HashMap::new(),
      graph_memo: HashMap::new(),
      packages_in_progress: HashSet::new(),
      graphs_in_progress: HashSet::new(),
      next_graph_id: 1,
      next_package_id: 1,
    }
  }

  fn start_graph(&mut self, parameters: ValueTable) -> Result<PackageGraphId, LoadError> {
    let hash = parameters.compute_hash().map_err(LoadError::Parameters)?;
    let id = PackageGraphId(self.next_graph_id);
    self.next_graph_id += 1;
    self.graph_parameters.insert(id, (parameters, hash.0));
    Ok(id)
  }

  fn finish_graph(&mut self, id: PackageGraphId, root_package_id: PackageId) {
    let global_parameters = self
      .graph_parameters
      .get(&id)
      .map(|(parameters, _)| parameters.clone())
      .unwrap_or_default();
    self.graphs.insert(
      id,
      PackageGraph {
        id,
        root_package_id,
        global_parameters,
      },
    );
  }

  fn parameter_hash(&self, graph_id: PackageGraphId) -> String {
    self
      .graph_parameters
      .get(&graph_id)
      .map(|(_, hash)| hash.clone())
      .unwrap_or_default()
  }

  fn allocate_package_id(&mut self) -> PackageId {
    let id = PackageId(self.next_package_id);
    self.next_package_id += 1;
    id
  }

  /// Load one package into `graph_id`, or return the id it already has there.
  fn load_package(
    &mut self,
    graph_id: PackageGraphId,
    resolved: ResolvedPackage,
    inherited: Option<LockScope>,
  ) -> Result<PackageId, LoadError> {
    let key = (graph_id, resolved.directory.clone());
    if self.packages_in_progress.contains(&key) {
      return Err(LoadError::CircularDependency {
        path: resolved.directory,
      });
    }
    if let Some(id) = self.package_memo.get(&graph_id).and_then(|m| m.get(&resolved.directory)) {
      debug!(directory = %resolved.directory.display(), graph = graph_id.0, "Package already loaded");
      return Ok(*id);
    }

    self.packages_in_progress.insert(key.clone());
    let result = match &resolved.location {
      PackageLocation::Builtin { name, version } => Ok(self.load_builtin(graph_id, &resolved, name, *version)),
      PackageLocation::Cache { .. } | PackageLocation::Local { .. } => {
        self.load_recipe_package(graph_id, &resolved, inherited)
      }
    };
    self.packages_in_progress.remove(&key);

    let id = result?;
    self
      .package_memo
      .entry(graph_id)
      .or_default()
      .insert(resolved.directory, id);
    Ok(id)
  }

  fn load_builtin(
    &mut self,
    graph_id: PackageGraphId,
    resolved: &ResolvedPackage,
    name: &str,
    version: SemanticVersion,
  ) -> PackageId {
    let id = self.allocate_package_id();
    debug!(name = %name, version = %version, "Built-in package");
    self.packages.insert(
      id,
      PackageInfo {
        id,
        graph_id,
        name: name.to_string(),
        language: resolved.language.clone().unwrap_or_default(),
        version: Some(version),
        is_prebuilt: true,
        package_directory: resolved.directory.clone(),
        target_directory: resolved.directory.clone(),
        recipe: None,
        dependencies: BTreeMap::new(),
      },
    );
    id
  }

  fn load_recipe_package(
    &mut self,
    graph_id: PackageGraphId,
    resolved: &ResolvedPackage,
    inherited: Option<LockScope>,
  ) -> Result<PackageId, LoadError> {
    let directory = &resolved.directory;
    let loader = self.loader;

    let own_lock = load_lock(directory);
    let (recipe_id, recipe) = self.recipes.load(&directory.join(RECIPE_FILENAME))?;
    let recipe = recipe.clone();

    let language_name = recipe.language.name.clone();
    let language = loader
      .languages
      .get(&language_name)
      .ok_or_else(|| LoadError::UnknownLanguage {
        language: language_name.clone(),
        package: recipe.name.clone(),
      })?;

    // A package's own lock replaces anything inherited from its parent.
    let (scope, entry) = match own_lock {
      Some(lock) => {
        let scope = LockScope::root(Rc::new(lock));
        let entry = scope.entry(&language_name, &recipe.name).cloned().ok_or_else(|| {
          LoadError::LockMismatch {
            path: directory.join(LOCK_FILENAME),
            language: language_name.clone(),
            name: recipe.name.clone(),
          }
        })?;
        (Some(scope), Some(entry))
      }
      None => {
        let key = lock_key(resolved.owner.as_deref(), &recipe.name);
        let entry = inherited.as_ref().and_then(|s| s.entry(&language_name, &key).cloned());
        (inherited, entry)
      }
    };

    let parameter_hash = self.parameter_hash(graph_id);
    let target_directory = language.target_directory_for(&loader.config.roots, &resolved.location, &parameter_hash);

    let id = self.allocate_package_id();
    debug!(
      id = id.0,
      graph = graph_id.0,
      name = %recipe.name,
      target = %target_directory.display(),
      "Package registered"
    );

    let mut declared = recipe.dependencies.clone();
    if recipe.name != language.extension() {
      let build = declared.entry(DependencyKind::Build).or_default();
      let extension = language.extension().to_string();
      let already_declared = build.iter().any(|r| matches!(r, PackageReference::Named { name, .. } if *name == extension));
      if !already_declared {
        build.push(PackageReference::Named {
          language: Some(loader.config.host_language.clone()),
          owner: None,
          name: extension,
          version: None,
        });
      }
    }

    let mut dependencies: BTreeMap<DependencyKind, Vec<PackageChildInfo>> = BTreeMap::new();
    for (kind, references) in &declared {
      let child_scope = scope.as_ref().and_then(|s| s.for_dependencies(entry.as_ref(), *kind));
      for reference in references {
        let context = ResolveContext {
          directory,
          language: &language_name,
          host_language: &loader.config.host_language,
          roots: &loader.config.roots,
          languages: loader.languages,
        };
        let child = resolve_reference(reference, *kind, &context, child_scope.as_ref())?;
        let target = if kind.crosses_graph() {
          ChildRef::Subgraph(self.load_subgraph(child, child_scope.clone())?)
        } else {
          ChildRef::InGraph(self.load_package(graph_id, child, child_scope.clone())?)
        };
        dependencies.entry(*kind).or_default().push(PackageChildInfo {
          reference: reference.clone(),
          target,
        });
      }
    }

    self.packages.insert(
      id,
      PackageInfo {
        id,
        graph_id,
        name: recipe.name.clone(),
        language: language_name,
        version: recipe.version.or(resolved.version),
        is_prebuilt: false,
        package_directory: directory.clone(),
        target_directory,
        recipe: Some(recipe_id),
        dependencies,
      },
    );
    Ok(id)
  }

  /// Load the graph rooted at a build or tool dependency.
  fn load_subgraph(&mut self, resolved: ResolvedPackage, scope: Option<LockScope>) -> Result<PackageGraphId, LoadError> {
    if self.graphs_in_progress.contains(&resolved.directory) {
      return Err(LoadError::CircularDependency {
        path: resolved.directory,
      });
    }
    if let Some(id) = self.graph_memo.get(&resolved.directory) {
      debug!(directory = %resolved.directory.display(), graph = id.0, "Graph already loaded");
      return Ok(*id);
    }

    let directory = resolved.directory.clone();
    let graph_id = self.start_graph(self.loader.options.host_parameters.clone())?;
    debug!(directory = %directory.display(), graph = graph_id.0, "Loading subgraph");

    self.graphs_in_progress.insert(directory.clone());
    let result = self.load_package(graph_id, resolved, scope);
    self.graphs_in_progress.remove(&directory);

    let root_package_id = result?;
    self.finish_graph(graph_id, root_package_id);
    self.graph_memo.insert(directory, graph_id);
    Ok(graph_id)
  }
}

/// Load the lock file next to a recipe. A broken lock file is reported and
/// ignored so resolution falls back to recipe and built-in versions.
fn load_lock(directory: &Path) -> Option<PackageLock> {
  let path = directory.join(LOCK_FILENAME);
  match PackageLock::load(&path) {
    Ok(Some(lock)) => {
      info!(path = %path.display(), "Package lock loaded");
      Some(lock)
    }
    Ok(None) => {
      info!(path = %path.display(), "PackageLock file does not exist");
      None
    }
    Err(e) => {
      warn!(path = %path.display(), error = %e, "Ignoring invalid package lock");
      None
    }
  }
}
