//! soup-lib: core of the soup incremental build orchestrator.
//!
//! A build runs in three phases:
//! - `load`: resolve a package and its dependencies into package graphs
//! - `generate`: ask each package's build extension for an operation graph
//! - `evaluate`: run the operations that are out of date
//!
//! Build state lives in small binary files (see [`codec`]) next to each
//! package's outputs, keyed by file ids from a shared [`fs_state`] registry.

pub mod build;
pub mod codec;
pub mod config;
pub mod consts;
pub mod evaluate;
pub mod fs_state;
pub mod generate;
pub mod language;
pub mod load;
pub mod lock;
pub mod operation;
pub mod package;
pub mod platform;
pub mod recipe;
pub mod util;
pub mod value;
