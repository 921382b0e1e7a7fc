//! The resolved package multi-graph produced by the load engine.

mod reference;
mod types;
mod version;

pub use reference::{LanguageReference, PackageReference, ReferenceError};
pub use types::{
  ChildRef, DependencyKind, PackageChildInfo, PackageGraph, PackageGraphId, PackageId, PackageInfo,
  PackageProvider,
};
pub use version::{SemanticVersion, VersionError};
