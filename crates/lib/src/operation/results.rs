use std::collections::{BTreeMap, BTreeSet};
use std::time::SystemTime;

use tracing::debug;

use super::graph::{OperationGraph, OperationId};
use crate::fs_state::FileId;

/// Outcome of the most recent execution of one operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationResult {
  pub was_successful: bool,
  /// When execution started, at tick resolution.
  pub evaluate_time: SystemTime,
  pub observed_input: BTreeSet<FileId>,
  pub observed_output: BTreeSet<FileId>,
}

pub type OperationResults = BTreeMap<OperationId, OperationResult>;

/// Keep only results whose operation is unchanged between two graphs.
///
/// Operation ids are only stable while the operation they name is
/// structurally identical, so any result for an operation that changed or
/// disappeared is dropped instead of being applied to the wrong command.
pub fn carry_over_results(
  previous: Option<&OperationGraph>,
  graph: &OperationGraph,
  results: &mut OperationResults,
) {
  let before = results.len();
  results.retain(|id, _| {
    let Some(current) = graph.get(*id) else {
      return false;
    };
    match previous.and_then(|p| p.get(*id)) {
      Some(old) => old == current,
      None => false,
    }
  });

  let dropped = before - results.len();
  if dropped > 0 {
    debug!(dropped, kept = results.len(), "Dropped results for changed operations");
  }
}
