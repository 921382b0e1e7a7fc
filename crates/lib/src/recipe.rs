//! Package manifests (`Recipe.toml`) and the per-run recipe cache.
//!
//! # Format
//!
//! ```toml
//! Name = "App"
//! Language = "C++|0.8"
//! Version = "1.0.0"
//!
//! [Dependencies]
//! Runtime = ["../Library/", "mwasplund|Json11@1.1.2"]
//! Build = ["mwasplund|Soup.Cpp.Compiler@1"]
//! ```
//!
//! The whole document is also kept as a [`ValueTable`] and handed to the
//! generator unchanged.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use crate::package::{
  DependencyKind, LanguageReference, PackageReference, ReferenceError, SemanticVersion, VersionError,
};
use crate::value::{ValueTable, table_from_toml};

#[derive(Debug, Error)]
pub enum RecipeError {
  #[error("recipe does not exist: {}", path.display())]
  Missing { path: PathBuf },

  #[error("failed to read recipe {}: {source}", path.display())]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to parse recipe {}: {source}", path.display())]
  Parse {
    path: PathBuf,
    #[source]
    source: toml::de::Error,
  },

  #[error("recipe {} is missing required field '{field}'", path.display())]
  MissingField { path: PathBuf, field: &'static str },

  #[error("recipe {} field '{field}' must be {expected}", path.display())]
  InvalidField {
    path: PathBuf,
    field: String,
    expected: &'static str,
  },

  #[error("recipe {} has an invalid reference: {source}", path.display())]
  Reference {
    path: PathBuf,
    #[source]
    source: ReferenceError,
  },

  #[error("recipe {} has an invalid version: {source}", path.display())]
  Version {
    path: PathBuf,
    #[source]
    source: VersionError,
  },
}

/// A parsed manifest.
#[derive(Debug, Clone, PartialEq)]
pub struct Recipe {
  pub path: PathBuf,
  pub name: String,
  pub language: LanguageReference,
  pub version: Option<SemanticVersion>,
  pub dependencies: BTreeMap<DependencyKind, Vec<PackageReference>>,
  pub table: ValueTable,
}

impl Recipe {
  /// Parse recipe text. `path` is used for error messages only.
  pub fn parse(path: &Path, content: &str) -> Result<Self, RecipeError> {
    let document: toml::Table = toml::from_str(content).map_err(|source| RecipeError::Parse {
      path: path.to_path_buf(),
      source,
    })?;

    let name = required_string(path, &document, "Name")?;
    let language = required_string(path, &document, "Language")?;
    let language = LanguageReference::parse(&language).map_err(|source| RecipeError::Reference {
      path: path.to_path_buf(),
      source,
    })?;

    let version = match document.get("Version") {
      None => None,
      Some(toml::Value::String(text)) => {
        Some(SemanticVersion::parse(text).map_err(|source| RecipeError::Version {
          path: path.to_path_buf(),
          source,
        })?)
      }
      Some(_) => return Err(invalid_field(path, "Version", "a string")),
    };

    let dependencies = match document.get("Dependencies") {
      None => BTreeMap::new(),
      Some(toml::Value::Table(table)) => parse_dependencies(path, table)?,
      Some(_) => return Err(invalid_field(path, "Dependencies", "a table")),
    };

    Ok(Self {
      path: path.to_path_buf(),
      name,
      language,
      version,
      dependencies,
      table: table_from_toml(document),
    })
  }

  pub fn dependencies(&self, kind: DependencyKind) -> &[PackageReference] {
    self.dependencies.get(&kind).map(Vec::as_slice).unwrap_or_default()
  }
}

fn required_string(path: &Path, document: &toml::Table, field: &'static str) -> Result<String, RecipeError> {
  match document.get(field) {
    Some(toml::Value::String(value)) if !value.trim().is_empty() => Ok(value.clone()),
    Some(toml::Value::String(_)) | None => Err(RecipeError::MissingField {
      path: path.to_path_buf(),
      field,
    }),
    Some(_) => Err(invalid_field(path, field, "a string")),
  }
}

fn invalid_field(path: &Path, field: &str, expected: &'static str) -> RecipeError {
  RecipeError::InvalidField {
    path: path.to_path_buf(),
    field: field.to_string(),
    expected,
  }
}

fn parse_dependencies(
  path: &Path,
  table: &toml::Table,
) -> Result<BTreeMap<DependencyKind, Vec<PackageReference>>, RecipeError> {
  let mut dependencies: BTreeMap<DependencyKind, Vec<PackageReference>> = BTreeMap::new();
  for (key, value) in table {
    let field = format!("Dependencies.{}", key);
    let toml::Value::Array(items) = value else {
      return Err(invalid_field(path, &field, "a list of references"));
    };

    let references = dependencies.entry(DependencyKind::from_key(key)).or_default();
    for item in items {
      let text = match item {
        toml::Value::String(text) => text.as_str(),
        toml::Value::Table(entry) => match entry.get("Reference") {
          Some(toml::Value::String(text)) => text.as_str(),
          _ => return Err(invalid_field(path, &field, "a list of references")),
        },
        _ => return Err(invalid_field(path, &field, "a list of references")),
      };
      let reference = PackageReference::parse(text).map_err(|source| RecipeError::Reference {
        path: path.to_path_buf(),
        source,
      })?;
      references.push(reference);
    }
  }
  Ok(dependencies)
}

/// Index into a [`RecipeCache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecipeId(pub usize);

/// Arena of recipes keyed by absolute manifest path.
///
/// Each path is read from disk at most once per run. Packages refer to their
/// recipe by [`RecipeId`].
#[derive(Debug, Default)]
pub struct RecipeCache {
  recipes: Vec<Recipe>,
  by_path: HashMap<PathBuf, RecipeId>,
}

impl RecipeCache {
  pub fn new() -> Self {
    Self::default()
  }

  /// Load the recipe at `path`, or return the cached one.
  pub fn load(&mut self, path: &Path) -> Result<(RecipeId, &Recipe), RecipeError> {
    if let Some(id) = self.by_path.get(path).copied() {
      debug!(path = %path.display(), "Recipe already loaded");
      return Ok((id, &self.recipes[id.0]));
    }

    info!(path = %path.display(), "Load Recipe");
    let content = match fs::read_to_string(path) {
      Ok(content) => content,
      Err(e) if e.kind() == io::ErrorKind::NotFound => {
        return Err(RecipeError::Missing {
          path: path.to_path_buf(),
        });
      }
      Err(source) => {
        return Err(RecipeError::Read {
          path: path.to_path_buf(),
          source,
        });
      }
    };

    let recipe = Recipe::parse(path, &content)?;
    let id = RecipeId(self.recipes.len());
    self.recipes.push(recipe);
    self.by_path.insert(path.to_path_buf(), id);
    Ok((id, &self.recipes[id.0]))
  }

  pub fn get(&self, id: RecipeId) -> Option<&Recipe> {
    self.recipes.get(id.0)
  }

  pub fn find(&self, path: &Path) -> Option<RecipeId> {
    self.by_path.get(path).copied()
  }

  pub fn len(&self) -> usize {
    self.recipes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.recipes.is_empty()
  }
}
