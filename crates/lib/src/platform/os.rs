use std::fmt;
use std::str::FromStr;

use super::PlatformError;

/// Value of the `System` build parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Os {
  Linux,
  MacOs,
  Windows,
}

impl Os {
  pub fn current() -> Option<Self> {
    std::env::consts::OS.parse().ok()
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Linux => "Linux",
      Self::MacOs => "MacOS",
      Self::Windows => "Windows",
    }
  }
}

/// Accepts the parameter spelling and Rust's `std::env::consts::OS` names,
/// ignoring case.
impl FromStr for Os {
  type Err = PlatformError;

  fn from_str(value: &str) -> Result<Self, Self::Err> {
    match value.to_ascii_lowercase().as_str() {
      "linux" => Ok(Self::Linux),
      "macos" | "darwin" => Ok(Self::MacOs),
      "windows" => Ok(Self::Windows),
      _ => Err(PlatformError::UnknownSystem(value.to_string())),
    }
  }
}

impl fmt::Display for Os {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}
