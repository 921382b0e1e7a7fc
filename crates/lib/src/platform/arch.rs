use std::fmt;
use std::str::FromStr;

use super::PlatformError;

/// Value of the `Architecture` build parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arch {
  X64,
  Arm64,
}

impl Arch {
  pub fn current() -> Option<Self> {
    std::env::consts::ARCH.parse().ok()
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::X64 => "x64",
      Self::Arm64 => "arm64",
    }
  }
}

/// Accepts the parameter spelling and the usual toolchain names.
impl FromStr for Arch {
  type Err = PlatformError;

  fn from_str(value: &str) -> Result<Self, Self::Err> {
    match value.to_ascii_lowercase().as_str() {
      "x64" | "x86_64" | "amd64" => Ok(Self::X64),
      "arm64" | "aarch64" => Ok(Self::Arm64),
      _ => Err(PlatformError::UnknownArchitecture(value.to_string())),
    }
  }
}

impl fmt::Display for Arch {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}
