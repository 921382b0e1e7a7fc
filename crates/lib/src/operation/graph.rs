use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::fs_state::FileId;

/// Identifier of an operation, unique within one graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OperationId(pub u32);

impl fmt::Display for OperationId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// One command in the build, with everything it is allowed to touch.
///
/// `children` are the operations this one depends on; they are evaluated
/// first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationInfo {
  pub id: OperationId,
  pub title: String,
  pub command: String,
  pub arguments: Vec<String>,
  pub working_directory: PathBuf,
  pub declared_input: BTreeSet<FileId>,
  pub declared_output: BTreeSet<FileId>,
  pub declared_read_access: BTreeSet<PathBuf>,
  pub declared_write_access: BTreeSet<PathBuf>,
  pub children: BTreeSet<OperationId>,
}

impl OperationInfo {
  pub fn new(
    id: OperationId,
    title: impl Into<String>,
    command: impl Into<String>,
    working_directory: impl Into<PathBuf>,
  ) -> Self {
    Self {
      id,
      title: title.into(),
      command: command.into(),
      arguments: Vec::new(),
      working_directory: working_directory.into(),
      declared_input: BTreeSet::new(),
      declared_output: BTreeSet::new(),
      declared_read_access: BTreeSet::new(),
      declared_write_access: BTreeSet::new(),
      children: BTreeSet::new(),
    }
  }

  /// Title for logs, falling back to the command line.
  pub fn display_name(&self) -> String {
    if !self.title.is_empty() {
      return self.title.clone();
    }
    std::iter::once(self.command.as_str())
      .chain(self.arguments.iter().map(String::as_str))
      .collect::<Vec<_>>()
      .join(" ")
  }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum OperationGraphError {
  #[error("operation {0} is defined more than once")]
  DuplicateOperation(OperationId),

  #[error("root operation {0} does not exist")]
  UnknownRoot(OperationId),

  #[error("operation {parent} depends on unknown operation {child}")]
  UnknownChild { parent: OperationId, child: OperationId },

  #[error("operation {0} is keyed under a different id")]
  MismatchedId(OperationId),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OperationGraph {
  pub root_operation_ids: Vec<OperationId>,
  pub operations: BTreeMap<OperationId, OperationInfo>,
}

impl OperationGraph {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn add_operation(&mut self, operation: OperationInfo) -> Result<(), OperationGraphError> {
    if self.operations.contains_key(&operation.id) {
      return Err(OperationGraphError::DuplicateOperation(operation.id));
    }
    self.operations.insert(operation.id, operation);
    Ok(())
  }

  pub fn get(&self, id: OperationId) -> Option<&OperationInfo> {
    self.operations.get(&id)
  }

  pub fn len(&self) -> usize {
    self.operations.len()
  }

  pub fn is_empty(&self) -> bool {
    self.operations.is_empty()
  }

  /// Check that every referenced id resolves. Cycles are detected when the
  /// graph is scheduled.
  pub fn validate(&self) -> Result<(), OperationGraphError> {
    for root in &self.root_operation_ids {
      if !self.operations.contains_key(root) {
        return Err(OperationGraphError::UnknownRoot(*root));
      }
    }
    for (id, operation) in &self.operations {
      if operation.id != *id {
        return Err(OperationGraphError::MismatchedId(*id));
      }
      if let Some(child) = operation.children.iter().find(|c| !self.operations.contains_key(c)) {
        return Err(OperationGraphError::UnknownChild { parent: *id, child: *child });
      }
    }
    Ok(())
  }

  /// Every file id referenced by a declared input or output.
  pub fn referenced_file_ids(&self) -> BTreeSet<FileId> {
    self
      .operations
      .values()
      .flat_map(|op| op.declared_input.iter().chain(op.declared_output.iter()))
      .copied()
      .collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn op(id: u32, children: &[u32]) -> OperationInfo {
    let mut info = OperationInfo::new(OperationId(id), format!("op {}", id), "/bin/true", "/work");
    info.children = children.iter().map(|c| OperationId(*c)).collect();
    info
  }

  #[test]
  fn validate_accepts_well_formed_graph() {
    let mut graph = OperationGraph::new();
    graph.add_operation(op(1, &[])).unwrap();
    graph.add_operation(op(2, &[1])).unwrap();
    graph.root_operation_ids = vec![OperationId(2)];

    assert_eq!(graph.validate(), Ok(()));
  }

  #[test]
  fn validate_rejects_unknown_root() {
    let mut graph = OperationGraph::new();
    graph.add_operation(op(1, &[])).unwrap();
    graph.root_operation_ids = vec![OperationId(5)];

    assert_eq!(graph.validate(), Err(OperationGraphError::UnknownRoot(OperationId(5))));
  }

  #[test]
  fn validate_rejects_unknown_child() {
    let mut graph = OperationGraph::new();
    graph.add_operation(op(1, &[3])).unwrap();

    assert_eq!(
      graph.validate(),
      Err(OperationGraphError::UnknownChild {
        parent: OperationId(1),
        child: OperationId(3)
      })
    );
  }

  #[test]
  fn duplicate_operation_is_rejected() {
    let mut graph = OperationGraph::new();
    graph.add_operation(op(1, &[])).unwrap();
    assert_eq!(
      graph.add_operation(op(1, &[])),
      Err(OperationGraphError::DuplicateOperation(OperationId(1)))
    );
  }

  #[test]
  fn display_name_falls_back_to_command_line() {
    let mut info = OperationInfo::new(OperationId(1), "", "clang", "/work");
    info.arguments = vec!["-c".to_string(), "main.cpp".to_string()];
    assert_eq!(info.display_name(), "clang -c main.cpp");
  }
}
