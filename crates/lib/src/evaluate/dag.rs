//! Dependency DAG over the operations of one graph.
//!
//! An operation's `children` are the operations it depends on, so edges run
//! from each child to its parent and waves come out children first.

use std::collections::{BTreeSet, HashMap};

use petgraph::Direction;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};

use super::EvaluateError;
use crate::operation::{OperationGraph, OperationGraphError, OperationId};

pub struct OperationDag {
  graph: DiGraph<OperationId, ()>,
  nodes: HashMap<OperationId, NodeIndex>,
}

impl OperationDag {
  pub fn from_graph(operations: &OperationGraph) -> Result<Self, EvaluateError> {
    let mut graph = DiGraph::new();
    let mut nodes = HashMap::new();

    for id in operations.operations.keys() {
      nodes.insert(*id, graph.add_node(*id));
    }

    for (id, operation) in &operations.operations {
      let parent = nodes[id];
      for child in &operation.children {
        let child_idx = nodes.get(child).ok_or(OperationGraphError::UnknownChild {
          parent: *id,
          child: *child,
        })?;
        graph.add_edge(*child_idx, parent, ());
      }
    }

    let dag = Self { graph, nodes };
    toposort(&dag.graph, None).map_err(|_| EvaluateError::CycleDetected)?;
    Ok(dag)
  }

  /// Operations grouped so that every dependency of a wave is in an earlier
  /// one. Each wave is sorted by id.
  pub fn waves(&self) -> Result<Vec<Vec<OperationId>>, EvaluateError> {
    let mut in_degree: HashMap<NodeIndex, usize> = self
      .graph
      .node_indices()
      .map(|idx| (idx, self.graph.neighbors_directed(idx, Direction::Incoming).count()))
      .collect();
    let mut remaining: BTreeSet<NodeIndex> = self.graph.node_indices().collect();
    let mut waves = Vec::new();

    while !remaining.is_empty() {
      let ready: Vec<NodeIndex> = remaining.iter().filter(|idx| in_degree[*idx] == 0).copied().collect();
      if ready.is_empty() {
        return Err(EvaluateError::CycleDetected);
      }

      for idx in &ready {
        remaining.remove(idx);
        for dependent in self.graph.neighbors_directed(*idx, Direction::Outgoing) {
          if let Some(degree) = in_degree.get_mut(&dependent) {
            *degree = degree.saturating_sub(1);
          }
        }
      }

      let mut wave: Vec<OperationId> = ready.into_iter().map(|idx| self.graph[idx]).collect();
      wave.sort();
      waves.push(wave);
    }

    Ok(waves)
  }

  /// Direct dependencies of an operation.
  pub fn dependencies(&self, id: OperationId) -> Vec<OperationId> {
    let Some(&idx) = self.nodes.get(&id) else {
      return Vec::new();
    };
    self
      .graph
      .neighbors_directed(idx, Direction::Incoming)
      .map(|dep| self.graph[dep])
      .collect()
  }
}
