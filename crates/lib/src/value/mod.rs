//! Dynamically typed values passed between build phases.
//!
//! Build parameters, recipe tables and generator input are all trees of
//! [`Value`]. The [`codec`] submodule reads and writes them in the BVT
//! binary format.

pub mod codec;
mod types;

pub use codec::{decode_value_table, encode_value_table, read_value_table, write_value_table};
pub use types::{Value, ValueList, ValueTable, ValueType};
pub(crate) use types::table_from_toml;
