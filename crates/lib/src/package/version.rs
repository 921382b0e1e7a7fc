use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// `major[.minor[.patch]]`. Missing components are distinct from zero:
/// `1.2` is not the same version as `1.2.0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SemanticVersion {
  pub major: u32,
  pub minor: Option<u32>,
  pub patch: Option<u32>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum VersionError {
  #[error("version is empty")]
  Empty,

  #[error("invalid version '{0}': expected major[.minor[.patch]]")]
  Invalid(String),
}

impl SemanticVersion {
  pub fn new(major: u32, minor: u32, patch: u32) -> Self {
    Self {
      major,
      minor: Some(minor),
      patch: Some(patch),
    }
  }

  pub fn parse(value: &str) -> Result<Self, VersionError> {
    let value = value.trim();
    if value.is_empty() {
      return Err(VersionError::Empty);
    }

    let invalid = || VersionError::Invalid(value.to_string());
    let mut parts = value.split('.');
    let mut component = |required: bool| -> Result<Option<u32>, VersionError> {
      match parts.next() {
        Some(part) => part.parse::<u32>().map(Some).map_err(|_| invalid()),
        None if required => Err(invalid()),
        None => Ok(None),
      }
    };

    let major = component(true)?.ok_or_else(invalid)?;
    let minor = component(false)?;
    let patch = if minor.is_some() { component(false)? } else { None };
    if parts.next().is_some() {
      return Err(invalid());
    }

    Ok(Self { major, minor, patch })
  }
}

impl FromStr for SemanticVersion {
  type Err = VersionError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Self::parse(s)
  }
}

impl fmt::Display for SemanticVersion {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.major)?;
    if let Some(minor) = self.minor {
      write!(f, ".{}", minor)?;
      if let Some(patch) = self.patch {
        write!(f, ".{}", patch)?;
      }
    }
    Ok(())
  }
}
