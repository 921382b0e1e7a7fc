//! Package and language references as written in recipes and lock files.
//!
//! A named reference has the form `[Language]Owner|Name@Version`, where every
//! part but the name is optional. Anything that starts with `.` or `/`, or is
//! an absolute path, refers to a local package directory instead.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Serialize, Serializer};
use thiserror::Error;

use super::version::{SemanticVersion, VersionError};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReferenceError {
  #[error("package reference is empty")]
  Empty,

  #[error("invalid package reference '{reference}': {reason}")]
  Invalid { reference: String, reason: &'static str },

  #[error("invalid version in reference '{reference}': {source}")]
  Version {
    reference: String,
    #[source]
    source: VersionError,
  },
}

/// A dependency as declared, before resolution.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PackageReference {
  Named {
    language: Option<String>,
    owner: Option<String>,
    name: String,
    version: Option<SemanticVersion>,
  },
  Local {
    path: PathBuf,
  },
}

impl PackageReference {
  pub fn named(name: impl Into<String>) -> Self {
    Self::Named {
      language: None,
      owner: None,
      name: name.into(),
      version: None,
    }
  }

  pub fn local(path: impl Into<PathBuf>) -> Self {
    Self::Local { path: path.into() }
  }

  pub fn parse(value: &str) -> Result<Self, ReferenceError> {
    let value = value.trim();
    if value.is_empty() {
      return Err(ReferenceError::Empty);
    }

    if value.starts_with('.') || value.starts_with('/') || Path::new(value).is_absolute() {
      return Ok(Self::local(value));
    }

    let invalid = |reason| ReferenceError::Invalid {
      reference: value.to_string(),
      reason,
    };

    let (language, rest) = match value.strip_prefix('[') {
      Some(tail) => {
        let (language, rest) = tail.split_once(']').ok_or_else(|| invalid("unterminated language"))?;
        if language.is_empty() {
          return Err(invalid("empty language"));
        }
        (Some(language.to_string()), rest)
      }
      None => (None, value),
    };

    let (rest, version) = match rest.split_once('@') {
      Some((rest, version)) => {
        let version = SemanticVersion::parse(version).map_err(|source| ReferenceError::Version {
          reference: value.to_string(),
          source,
        })?;
        (rest, Some(version))
      }
      None => (rest, None),
    };

    let (owner, name) = match rest.split_once('|') {
      Some((owner, name)) => {
        if owner.is_empty() {
          return Err(invalid("empty owner"));
        }
        (Some(owner.to_string()), name)
      }
      None => (None, rest),
    };

    if name.is_empty() {
      return Err(invalid("empty name"));
    }
    if name.contains(['|', '[', ']', '@']) {
      return Err(invalid("unexpected separator in name"));
    }

    Ok(Self::Named {
      language,
      owner,
      name: name.to_string(),
      version,
    })
  }

  pub fn is_local(&self) -> bool {
    matches!(self, Self::Local { .. })
  }
}

impl FromStr for PackageReference {
  type Err = ReferenceError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Self::parse(s)
  }
}

impl fmt::Display for PackageReference {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Local { path } => write!(f, "{}", path.display()),
      Self::Named {
        language,
        owner,
        name,
        version,
      } => {
        if let Some(language) = language {
          write!(f, "[{}]", language)?;
        }
        if let Some(owner) = owner {
          write!(f, "{}|", owner)?;
        }
        write!(f, "{}", name)?;
        if let Some(version) = version {
          write!(f, "@{}", version)?;
        }
        Ok(())
      }
    }
  }
}

impl Serialize for PackageReference {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(self)
  }
}

/// The `Language` field of a recipe: `Name|Version` or just `Name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageReference {
  pub name: String,
  pub version: Option<SemanticVersion>,
}

impl LanguageReference {
  pub fn parse(value: &str) -> Result<Self, ReferenceError> {
    let value = value.trim();
    if value.is_empty() {
      return Err(ReferenceError::Empty);
    }

    let (name, version) = match value.split_once('|') {
      Some((name, version)) => {
        let version = SemanticVersion::parse(version).map_err(|source| ReferenceError::Version {
          reference: value.to_string(),
          source,
        })?;
        (name, Some(version))
      }
      None => (value, None),
    };

    if name.is_empty() {
      return Err(ReferenceError::Invalid {
        reference: value.to_string(),
        reason: "empty language name",
      });
    }

    Ok(Self {
      name: name.to_string(),
      version,
    })
  }
}

impl fmt::Display for LanguageReference {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match &self.version {
      Some(version) => write!(f, "{}|{}", self.name, version),
      None => write!(f, "{}", self.name),
    }
  }
}
