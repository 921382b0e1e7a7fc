//! Reference resolution: which directory and version a dependency names.

use std::path::{Path, PathBuf};
use std::rc::Rc;

use tracing::trace;

use super::LoadError;
use crate::config::SoupRoots;
use crate::language::{LanguageRegistry, LanguageSupport, PackageLocation};
use crate::lock::{LockEntry, PackageLock, ROOT_CLOSURE, lock_key};
use crate::package::{DependencyKind, PackageReference, SemanticVersion};
use crate::util::path::absolutize;

/// The lock closure that pins versions for one subtree.
#[derive(Debug, Clone)]
pub(super) struct LockScope {
  lock: Rc<PackageLock>,
  closure: String,
}

impl LockScope {
  pub(super) fn root(lock: Rc<PackageLock>) -> Self {
    Self {
      lock,
      closure: ROOT_CLOSURE.to_string(),
    }
  }

  pub(super) fn closure(&self) -> &str {
    &self.closure
  }

  pub(super) fn entry(&self, language: &str, key: &str) -> Option<&LockEntry> {
    self.lock.get(&self.closure, language, key)
  }

  fn pinned_version(&self, language: &str, key: &str) -> Option<SemanticVersion> {
    self.entry(language, key).and_then(LockEntry::semantic_version)
  }

  /// Scope for the build or tool dependencies of the package `entry`
  /// describes. Runtime dependencies share the current scope.
  pub(super) fn for_dependencies(&self, entry: Option<&LockEntry>, kind: DependencyKind) -> Option<Self> {
    let closure = match kind {
      DependencyKind::Build => entry?.build.as_ref()?,
      DependencyKind::Tool => entry?.tool.as_ref()?,
      DependencyKind::Runtime | DependencyKind::Other => return Some(self.clone()),
    };
    Some(Self {
      lock: Rc::clone(&self.lock),
      closure: closure.clone(),
    })
  }
}

/// A dependency after version and directory resolution.
#[derive(Debug, Clone)]
pub(super) struct ResolvedPackage {
  /// Known up front for named references, read from the recipe otherwise.
  pub language: Option<String>,
  pub owner: Option<String>,
  pub location: PackageLocation,
  pub directory: PathBuf,
  pub version: Option<SemanticVersion>,
}

/// What the declaring package contributes to resolving its dependencies.
pub(super) struct ResolveContext<'a> {
  pub directory: &'a Path,
  pub language: &'a str,
  pub host_language: &'a str,
  pub roots: &'a SoupRoots,
  pub languages: &'a LanguageRegistry,
}

impl ResolveContext<'_> {
  /// Language assumed for a named reference that does not state one.
  /// Build dependencies are extensions and run in the host language.
  fn implicit_language(&self, kind: DependencyKind) -> &str {
    match kind {
      DependencyKind::Build => self.host_language,
      DependencyKind::Tool | DependencyKind::Runtime | DependencyKind::Other => self.language,
    }
  }

  fn language(&self, name: &str, reference: &PackageReference) -> Result<&dyn LanguageSupport, LoadError> {
    self.languages.get(name).ok_or_else(|| LoadError::UnknownLanguage {
      language: name.to_string(),
      package: reference.to_string(),
    })
  }
}

/// Resolve `reference` declared by the package in `context`.
///
/// Named references take the first version found in: the reference itself,
/// the lock scope, the built-in registry (packages without an owner only).
pub(super) fn resolve_reference(
  reference: &PackageReference,
  kind: DependencyKind,
  context: &ResolveContext<'_>,
  scope: Option<&LockScope>,
) -> Result<ResolvedPackage, LoadError> {
  match reference {
    PackageReference::Local { path } => {
      let directory = canonical_directory(context.directory, path);
      Ok(ResolvedPackage {
        language: None,
        owner: None,
        location: PackageLocation::Local {
          directory: directory.clone(),
        },
        directory,
        version: None,
      })
    }
    PackageReference::Named {
      language,
      owner,
      name,
      version,
    } => {
      let language_name = language.as_deref().unwrap_or_else(|| context.implicit_language(kind));
      let support = context.language(language_name, reference)?;
      let key = lock_key(owner.as_deref(), name);

      let pinned = scope.and_then(|s| s.pinned_version(language_name, &key));
      let builtin = match owner {
        None => support.resolve_builtin_version(name),
        Some(_) => None,
      };
      let resolved_version = version.or(pinned).or(builtin).ok_or_else(|| LoadError::UnresolvedDependency {
        reference: reference.to_string(),
        package: context.directory.to_path_buf(),
      })?;

      trace!(
        reference = %reference,
        version = %resolved_version,
        explicit = version.is_some(),
        pinned = pinned.is_some(),
        "Resolved dependency version"
      );

      let location = match owner {
        Some(owner) => PackageLocation::Cache {
          owner: owner.clone(),
          name: name.clone(),
          version: resolved_version,
        },
        None => PackageLocation::Builtin {
          name: name.clone(),
          version: resolved_version,
        },
      };
      let directory = support.package_directory_for(context.roots, &location);

      Ok(ResolvedPackage {
        language: Some(language_name.to_string()),
        owner: owner.clone(),
        location,
        directory,
        version: Some(resolved_version),
      })
    }
  }
}

/// Resolve a package directory, following symlinks when it exists so that
/// two spellings of one directory load one package.
pub(super) fn canonical_directory(base: &Path, path: &Path) -> PathBuf {
  let directory = absolutize(base, path);
  dunce::canonicalize(&directory).unwrap_or(directory)
}
