//! Per-language knowledge the load engine needs.
//!
//! Every language names a build extension package (written in the host
//! language) that every package of that language implicitly depends on, and
//! decides where packages and their outputs live on disk.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use crate::config::{SoupConfig, SoupRoots};
use crate::package::SemanticVersion;

/// Where a resolved package comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageLocation {
  /// Shipped with the tool and already built.
  Builtin { name: String, version: SemanticVersion },
  /// An owned package in the user's package cache.
  Cache {
    owner: String,
    name: String,
    version: SemanticVersion,
  },
  /// A directory referenced by path.
  Local { directory: PathBuf },
}

/// Capabilities of one build language.
///
/// The directory layout has a default convention; languages only override it
/// when they need to.
pub trait LanguageSupport: fmt::Debug + Send + Sync {
  fn name(&self) -> &str;

  /// Name of the build extension package for this language.
  fn extension(&self) -> &str;

  /// Version of the built-in package `name` written in this language.
  fn resolve_builtin_version(&self, name: &str) -> Option<SemanticVersion>;

  fn package_directory_for(&self, roots: &SoupRoots, location: &PackageLocation) -> PathBuf {
    match location {
      PackageLocation::Builtin { name, version } => roots
        .builtin_root
        .join(self.name())
        .join(name)
        .join(version.to_string()),
      PackageLocation::Cache { owner, name, version } => roots
        .package_cache()
        .join(self.name())
        .join(owner)
        .join(name)
        .join(version.to_string()),
      PackageLocation::Local { directory } => directory.clone(),
    }
  }

  /// Output directory for a package built with the given parameter hash.
  /// Built-in packages are prebuilt in place.
  fn target_directory_for(&self, roots: &SoupRoots, location: &PackageLocation, parameter_hash: &str) -> PathBuf {
    match location {
      PackageLocation::Builtin { .. } => self.package_directory_for(roots, location),
      PackageLocation::Cache { owner, name, version } => roots
        .package_output()
        .join(self.name())
        .join(owner)
        .join(name)
        .join(version.to_string())
        .join(parameter_hash),
      PackageLocation::Local { directory } => directory.join("out").join(parameter_hash),
    }
  }
}

/// A language configured by name, extension and built-in package table.
#[derive(Debug, Clone)]
pub struct KnownLanguage {
  name: String,
  extension: String,
  builtin: BTreeMap<String, SemanticVersion>,
}

impl KnownLanguage {
  pub fn new(
    name: impl Into<String>,
    extension: impl Into<String>,
    builtin: BTreeMap<String, SemanticVersion>,
  ) -> Self {
    Self {
      name: name.into(),
      extension: extension.into(),
      builtin,
    }
  }
}

impl LanguageSupport for KnownLanguage {
  fn name(&self) -> &str {
    &self.name
  }

  fn extension(&self) -> &str {
    &self.extension
  }

  fn resolve_builtin_version(&self, name: &str) -> Option<SemanticVersion> {
    self.builtin.get(name).copied()
  }
}

/// Languages available to one load, keyed by name.
#[derive(Debug, Default)]
pub struct LanguageRegistry {
  languages: BTreeMap<String, Box<dyn LanguageSupport>>,
}

impl LanguageRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn from_config(config: &SoupConfig) -> Self {
    let mut registry = Self::new();
    for (name, language) in &config.languages {
      let builtin = config.builtin.get(name).cloned().unwrap_or_default();
      registry.register(KnownLanguage::new(name.clone(), language.extension.clone(), builtin));
    }
    registry
  }

  pub fn register(&mut self, language: impl LanguageSupport + 'static) {
    self.languages.insert(language.name().to_string(), Box::new(language));
  }

  pub fn get(&self, name: &str) -> Option<&dyn LanguageSupport> {
    self.languages.get(name).map(|language| language.as_ref())
  }

  pub fn names(&self) -> impl Iterator<Item = &str> {
    self.languages.keys().map(String::as_str)
  }
}
