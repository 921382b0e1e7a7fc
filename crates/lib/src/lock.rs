//! Lock file management for dependency resolution.
//!
//! The lock file (`PackageLock.toml`) pins dependency versions per closure so
//! that a build resolves the same packages every time. It lives next to the
//! root recipe. The `Root` closure holds the packages built for the target;
//! every build or tool closure holds the packages one of them needs on the
//! host.
//!
//! # Lock File Format
//!
//! ```toml
//! Version = 1
//!
//! [Closures.Root."C++"]
//! App = { Version = "./", Build = "Build0", Tool = "Tool0" }
//! "mwasplund|Json11" = { Version = "1.1.2", Build = "Build0" }
//!
//! [Closures.Build0.Wren]
//! "Soup.Cpp" = { Version = "0.8.2" }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::package::SemanticVersion;

/// Current lock file format version.
pub const LOCK_VERSION: u32 = 1;

/// Closure holding the packages built for the target.
pub const ROOT_CLOSURE: &str = "Root";

/// Packages of one closure, keyed by language and then by [`lock_key`].
pub type LockClosure = BTreeMap<String, BTreeMap<String, LockEntry>>;

/// A lock file containing pinned dependency versions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PackageLock {
  /// Lock file format version.
  pub version: u32,
  /// Closures keyed by name.
  #[serde(default)]
  pub closures: BTreeMap<String, LockClosure>,
}

/// A locked package entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LockEntry {
  /// Pinned version, or the relative directory for local packages.
  pub version: String,

  /// Closure that resolves this package's build dependencies.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub build: Option<String>,

  /// Closure that resolves this package's tool dependencies.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub tool: Option<String>,
}

/// Errors that can occur when working with lock files.
#[derive(Debug, Error)]
pub enum LockError {
  /// Failed to read the lock file.
  #[error("failed to read lock file: {0}")]
  Read(#[source] io::Error),

  /// Failed to write the lock file.
  #[error("failed to write lock file: {0}")]
  Write(#[source] io::Error),

  /// Failed to parse the lock file TOML.
  #[error("failed to parse lock file: {0}")]
  Parse(#[source] toml::de::Error),

  /// Failed to serialize the lock file.
  #[error("failed to serialize lock file: {0}")]
  Serialize(#[source] toml::ser::Error),

  /// Lock file version is not supported.
  #[error("unsupported lock file version {0}, expected {LOCK_VERSION}")]
  UnsupportedVersion(u32),
}

/// Key of a package inside a closure: `Owner|Name`, or `Name` for packages
/// without an owner.
pub fn lock_key(owner: Option<&str>, name: &str) -> String {
  match owner {
    Some(owner) => format!("{}|{}", owner, name),
    None => name.to_string(),
  }
}

impl Default for PackageLock {
  fn default() -> Self {
    Self::new()
  }
}

impl PackageLock {
  /// Create a new empty lock file.
  pub fn new() -> Self {
    Self {
      version: LOCK_VERSION,
      closures: BTreeMap::new(),
    }
  }

  /// Load a lock file from the given path.
  ///
  /// Returns `Ok(None)` if the file doesn't exist.
  /// Returns `Err` if the file exists but couldn't be read or parsed.
  pub fn load(path: &Path) -> Result<Option<Self>, LockError> {
    let content = match fs::read_to_string(path) {
      Ok(content) => content,
      Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
      Err(e) => return Err(LockError::Read(e)),
    };

    let lock: PackageLock = toml::from_str(&content).map_err(LockError::Parse)?;

    if lock.version != LOCK_VERSION {
      return Err(LockError::UnsupportedVersion(lock.version));
    }

    Ok(Some(lock))
  }

  pub fn save(&self, path: &Path) -> Result<(), LockError> {
    let content = toml::to_string_pretty(self).map_err(LockError::Serialize)?;
    fs::write(path, content).map_err(LockError::Write)?;
    Ok(())
  }

  pub fn get(&self, closure: &str, language: &str, key: &str) -> Option<&LockEntry> {
    self.closures.get(closure)?.get(language)?.get(key)
  }

  pub fn insert(&mut self, closure: &str, language: &str, key: String, entry: LockEntry) {
    self
      .closures
      .entry(closure.to_string())
      .or_default()
      .entry(language.to_string())
      .or_default()
      .insert(key, entry);
  }
}

impl LockEntry {
  pub fn new(version: impl Into<String>) -> Self {
    Self {
      version: version.into(),
      build: None,
      tool: None,
    }
  }

  pub fn with_build(mut self, closure: impl Into<String>) -> Self {
    self.build = Some(closure.into());
    self
  }

  pub fn with_tool(mut self, closure: impl Into<String>) -> Self {
    self.tool = Some(closure.into());
    self
  }

  /// The pinned version, when this entry pins a named package.
  pub fn semantic_version(&self) -> Option<SemanticVersion> {
    SemanticVersion::parse(&self.version).ok()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  mod lock_file {
    use super::*;

    #[test]
    fn insert_and_get() {
      let mut lock = PackageLock::new();
      lock.insert(
        ROOT_CLOSURE,
        "C++",
        lock_key(Some("mwasplund"), "Json11"),
        LockEntry::new("1.1.2").with_build("Build0"),
      );

      let entry = lock.get(ROOT_CLOSURE, "C++", "mwasplund|Json11").unwrap();
      assert_eq!(entry.semantic_version(), Some(SemanticVersion::new(1, 1, 2)));
      assert_eq!(entry.build.as_deref(), Some("Build0"));
      assert!(lock.get(ROOT_CLOSURE, "C#", "mwasplund|Json11").is_none());
    }

    #[test]
    fn save_and_load_roundtrip() {
      let temp_dir = TempDir::new().unwrap();
      let lock_path = temp_dir.path().join(crate::consts::LOCK_FILENAME);

      let mut original = PackageLock::new();
      original.insert(
        ROOT_CLOSURE,
        "C++",
        "App".to_string(),
        LockEntry::new("./").with_build("Build0").with_tool("Tool0"),
      );
      original.insert("Build0", "Wren", "Soup.Cpp".to_string(), LockEntry::new("0.8.2"));

      original.save(&lock_path).unwrap();
      let loaded = PackageLock::load(&lock_path).unwrap().unwrap();

      assert_eq!(original, loaded);
    }

    #[test]
    fn load_nonexistent_returns_none() {
      let temp_dir = TempDir::new().unwrap();
      let result = PackageLock::load(&temp_dir.path().join("PackageLock.toml")).unwrap();
      assert!(result.is_none());
    }

    #[test]
    fn load_invalid_toml_returns_error() {
      let temp_dir = TempDir::new().unwrap();
      let lock_path = temp_dir.path().join("PackageLock.toml");

      fs::write(&lock_path, "not = valid = toml").unwrap();

      assert!(matches!(PackageLock::load(&lock_path), Err(LockError::Parse(_))));
    }

    #[test]
    fn load_unsupported_version_returns_error() {
      let temp_dir = TempDir::new().unwrap();
      let lock_path = temp_dir.path().join("PackageLock.toml");

      fs::write(&lock_path, "Version = 999\n").unwrap();

      assert!(matches!(
        PackageLock::load(&lock_path),
        Err(LockError::UnsupportedVersion(999))
      ));
    }
  }

  mod format {
    use super::*;

    #[test]
    fn parses_documented_layout() {
      let lock: PackageLock = toml::from_str(
        r#"
          Version = 1

          [Closures.Root."C++"]
          App = { Version = "./", Build = "Build0" }
          "mwasplund|Json11" = { Version = "1.1.2" }

          [Closures.Build0.Wren]
          "Soup.Cpp" = { Version = "0.8.2" }
        "#,
      )
      .unwrap();

      assert_eq!(lock.get(ROOT_CLOSURE, "C++", "App").unwrap().version, "./");
      assert_eq!(
        lock.get("Build0", "Wren", "Soup.Cpp").unwrap().semantic_version(),
        Some(SemanticVersion::new(0, 8, 2))
      );
    }

    #[test]
    fn optional_closures_are_omitted() {
      let text = toml::to_string(&LockEntry::new("1.0.0")).unwrap();
      assert!(!text.contains("Build"));
      assert!(!text.contains("Tool"));
    }

    #[test]
    fn local_entries_have_no_semantic_version() {
      assert!(LockEntry::new("../Library/").semantic_version().is_none());
    }
  }
}
