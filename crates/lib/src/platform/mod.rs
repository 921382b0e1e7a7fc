pub mod arch;
pub mod os;
pub mod paths;

pub use arch::Arch;
pub use os::Os;
use std::fmt;

use thiserror::Error;

use crate::value::{Value, ValueTable};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlatformError {
  #[error("unknown architecture '{0}' (expected x64 or arm64)")]
  UnknownArchitecture(String),

  #[error("unknown system '{0}' (expected Linux, MacOS or Windows)")]
  UnknownSystem(String),
}

/// Host platform identifier combining architecture and OS (e.g. "x64-Linux")
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Platform {
  pub arch: Arch,
  pub os: Os,
}

impl Platform {
  pub fn new(arch: Arch, os: Os) -> Self {
    Self { arch, os }
  }

  /// Detect the current platform at runtime
  ///
  /// Returns `None` if the OS or architecture is not supported
  pub fn current() -> Option<Self> {
    Some(Self {
      arch: Arch::current()?,
      os: Os::current()?,
    })
  }

  pub fn triple(&self) -> String {
    format!("{}-{}", self.arch, self.os)
  }

  /// Build parameters describing this platform as a build host.
  ///
  /// Tool and build-extension graphs always run on the host, so they are
  /// loaded with these parameters instead of the user's target parameters.
  pub fn host_parameters(&self) -> ValueTable {
    build_parameters(self.arch.as_str(), self.os.as_str(), HOST_FLAVOR)
  }
}

/// Flavor every host graph is built with.
pub const HOST_FLAVOR: &str = "Release";

/// Global parameters of a package graph.
pub fn build_parameters(architecture: &str, system: &str, flavor: &str) -> ValueTable {
  let mut table = ValueTable::new();
  table.insert("Architecture".to_string(), Value::from(architecture));
  table.insert("System".to_string(), Value::from(system));
  table.insert("Flavor".to_string(), Value::from(flavor));
  table
}

impl fmt::Display for Platform {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.triple())
  }
}
