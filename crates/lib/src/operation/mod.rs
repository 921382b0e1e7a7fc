//! Operation graphs and their recorded results.
//!
//! A generator turns one package into an [`OperationGraph`]: a DAG of
//! commands with declared file access. Each evaluate pass records an
//! [`OperationResult`] per executed operation so the next pass can skip work
//! whose inputs have not changed.

pub mod codec;
mod graph;
mod results;

pub use codec::{
  decode_operation_graph, decode_operation_results, encode_operation_graph, encode_operation_results,
  read_operation_graph, read_operation_results, write_operation_graph, write_operation_results,
};
pub use graph::{OperationGraph, OperationGraphError, OperationId, OperationInfo};
pub use results::{OperationResult, OperationResults, carry_over_results};
