//! Hashing utilities for parameter-addressed target directories.
//!
//! Every package graph carries a table of global parameters. Two builds of
//! the same package with different parameters must never share a target
//! directory, so the directory name includes a truncated SHA-256 of the
//! parameters' canonical JSON form. `ValueTable` is a `BTreeMap`, which makes
//! the serialized form independent of insertion order.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::consts::PARAMETER_HASH_LEN;
use crate::value::ValueTable;

pub type HashError = serde_json::Error;

/// A truncated hash identifying one parameter set.
///
/// # Format
///
/// Lowercase hexadecimal, `PARAMETER_HASH_LEN` characters long.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectHash(pub String);

impl std::fmt::Display for ObjectHash {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}

pub trait Hashable: Serialize {
  fn compute_hash(&self) -> Result<ObjectHash, HashError> {
    let serialized = serde_json::to_string(self)?;
    let full = hash_bytes(serialized.as_bytes());
    Ok(ObjectHash(full[..PARAMETER_HASH_LEN].to_string()))
  }
}

impl Hashable for ValueTable {}

/// Full 64-character SHA-256 of arbitrary bytes.
pub fn hash_bytes(data: &[u8]) -> String {
  let mut hasher = Sha256::new();
  hasher.update(data);
  format!("{:x}", hasher.finalize())
}
