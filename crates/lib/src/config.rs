//! Run configuration: storage roots, known languages and built-in packages.
//!
//! Defaults are merged with an optional `config.toml` in the platform config
//! directory, and roots can be overridden through environment variables:
//!
//! - `SOUP_ROOT`: user root holding the package cache and its outputs
//! - `SOUP_BUILTIN_ROOT`: directory of built-in (prebuilt) packages
//! - `SOUP_STATE_ROOT`: directory holding the file system state
//!
//! ```toml
//! HostLanguage = "Wren"
//!
//! [Languages."C++"]
//! Extension = "Soup.Cpp"
//!
//! [Builtin.Wren]
//! "Soup.Cpp" = "0.8.2"
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::consts::CONFIG_FILENAME;
use crate::package::{SemanticVersion, VersionError};
use crate::platform::paths::{config_dir, data_dir};

pub const ROOT_ENV: &str = "SOUP_ROOT";
pub const BUILTIN_ROOT_ENV: &str = "SOUP_BUILTIN_ROOT";
pub const STATE_ROOT_ENV: &str = "SOUP_STATE_ROOT";

/// Language whose packages run on the build host (build extensions).
pub const DEFAULT_HOST_LANGUAGE: &str = "Wren";

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to read config file {}: {source}", path.display())]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to parse config file {}: {source}", path.display())]
  Parse {
    path: PathBuf,
    #[source]
    source: toml::de::Error,
  },

  #[error("invalid built-in version for {language} package {name}: {source}")]
  BuiltinVersion {
    language: String,
    name: String,
    #[source]
    source: VersionError,
  },
}

/// Where packages and build state live on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoupRoots {
  pub user_root: PathBuf,
  pub builtin_root: PathBuf,
  pub state_root: PathBuf,
}

impl SoupRoots {
  /// Resolve roots from the environment, falling back to defaults.
  pub fn current(working_directory: &Path) -> Self {
    let user_root = Self::user_root();
    let builtin_root = std::env::var_os(BUILTIN_ROOT_ENV)
      .map(PathBuf::from)
      .unwrap_or_else(|| user_root.join("builtin"));
    let state_root = std::env::var_os(STATE_ROOT_ENV)
      .map(PathBuf::from)
      .unwrap_or_else(|| Self::default_state_root(working_directory));

    Self {
      user_root,
      builtin_root,
      state_root,
    }
  }

  pub fn user_root() -> PathBuf {
    if let Some(path) = std::env::var_os(ROOT_ENV) {
      return PathBuf::from(path);
    }

    data_dir()
  }

  pub fn default_state_root(working_directory: &Path) -> PathBuf {
    working_directory.join("out")
  }

  pub fn package_cache(&self) -> PathBuf {
    self.user_root.join("packages")
  }

  pub fn package_output(&self) -> PathBuf {
    self.user_root.join("out")
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageConfig {
  /// Build extension package, written in the host language.
  pub extension: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SoupConfig {
  pub roots: SoupRoots,
  pub host_language: String,
  pub languages: BTreeMap<String, LanguageConfig>,
  /// Built-in package versions by language and name.
  pub builtin: BTreeMap<String, BTreeMap<String, SemanticVersion>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
struct ConfigFile {
  host_language: Option<String>,
  #[serde(default)]
  languages: BTreeMap<String, LanguageFileEntry>,
  #[serde(default)]
  builtin: BTreeMap<String, BTreeMap<String, String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct LanguageFileEntry {
  extension: String,
}

impl SoupConfig {
  /// Built-in configuration with the given roots.
  pub fn with_roots(roots: SoupRoots) -> Self {
    let languages = [("C++", "Soup.Cpp"), ("C#", "Soup.CSharp"), ("Wren", "Soup.Wren")]
      .into_iter()
      .map(|(language, extension)| {
        (
          language.to_string(),
          LanguageConfig {
            extension: extension.to_string(),
          },
        )
      })
      .collect();

    let mut builtin = BTreeMap::new();
    builtin.insert(
      DEFAULT_HOST_LANGUAGE.to_string(),
      BTreeMap::from([
        ("Soup.Cpp".to_string(), SemanticVersion::new(0, 8, 2)),
        ("Soup.CSharp".to_string(), SemanticVersion::new(0, 11, 0)),
        ("Soup.Wren".to_string(), SemanticVersion::new(0, 4, 1)),
      ]),
    );

    Self {
      roots,
      host_language: DEFAULT_HOST_LANGUAGE.to_string(),
      languages,
      builtin,
    }
  }

  /// Defaults, environment roots and the global config file if present.
  pub fn load(working_directory: &Path) -> Result<Self, ConfigError> {
    let path = config_dir().join(CONFIG_FILENAME);
    Self::load_from(&path, SoupRoots::current(working_directory))
  }

  /// Merge the config file at `path` (if it exists) over the defaults.
  pub fn load_from(path: &Path, roots: SoupRoots) -> Result<Self, ConfigError> {
    let mut config = Self::with_roots(roots);

    let content = match fs::read_to_string(path) {
      Ok(content) => content,
      Err(e) if e.kind() == io::ErrorKind::NotFound => {
        debug!(path = %path.display(), "No config file, using defaults");
        return Ok(config);
      }
      Err(source) => {
        return Err(ConfigError::Read {
          path: path.to_path_buf(),
          source,
        });
      }
    };

    let file: ConfigFile = toml::from_str(&content).map_err(|source| ConfigError::Parse {
      path: path.to_path_buf(),
      source,
    })?;
    config.merge(file)?;
    debug!(path = %path.display(), "Config file loaded");
    Ok(config)
  }

  fn merge(&mut self, file: ConfigFile) -> Result<(), ConfigError> {
    if let Some(host_language) = file.host_language {
      self.host_language = host_language;
    }
    for (language, entry) in file.languages {
      self.languages.insert(
        language,
        LanguageConfig {
          extension: entry.extension,
        },
      );
    }
    for (language, packages) in file.builtin {
      let versions = self.builtin.entry(language.clone()).or_default();
      for (name, version) in packages {
        let version = SemanticVersion::parse(&version).map_err(|source| ConfigError::BuiltinVersion {
          language: language.clone(),
          name: name.clone(),
          source,
        })?;
        versions.insert(name, version);
      }
    }
    Ok(())
  }

  pub fn builtin_version(&self, language: &str, name: &str) -> Option<SemanticVersion> {
    self.builtin.get(language)?.get(name).copied()
  }
}
