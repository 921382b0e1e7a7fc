//! Shared utilities.
//!
//! Hashing, path normalization, tick conversion and test helpers.

pub mod hash;
pub mod path;
pub mod time;

#[cfg(test)]
pub mod testutil;
