//! File identity registry.
//!
//! Maps absolute paths to small dense [`FileId`]s shared by every operation
//! graph and result set in one build, and caches last-write times so that a
//! file is queried from disk at most once per evaluate pass.

pub mod codec;
mod registry;

pub use codec::{decode_file_system_state, encode_file_system_state, read_file_table, write_file_table};
pub use registry::FileSystemRegistry;

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Dense identifier for a file path. Ids start at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FileId(pub u32);

impl fmt::Display for FileId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// Persistent form of the registry.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FileSystemState {
  /// Opaque generation id of the registry instance.
  pub id: u32,
  /// High-water mark for allocation. Never decreases.
  pub max_file_id: u32,
  pub files: BTreeMap<FileId, PathBuf>,
}
