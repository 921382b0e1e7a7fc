//! Incremental evaluation of one operation graph.
//!
//! Every operation is checked against its previous result, children first.
//! An operation runs again when it has no previous result, its previous run
//! failed, an input was written after its last evaluate time, or one of its
//! outputs has disappeared. Everything else is skipped.
//!
//! Out of date operations run in dependency waves with bounded parallelism.
//! Within a wave, operations whose declared write access overlaps another's
//! declared access are deferred to a later batch.

pub mod dag;
pub mod monitor;

use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, trace, warn};

use crate::fs_state::{FileId, FileSystemRegistry};
use crate::operation::{OperationGraph, OperationGraphError, OperationId, OperationInfo, OperationResult, OperationResults};
use crate::util::path::overlaps;
use crate::util::time::{now, truncate_to_ticks};

pub use dag::OperationDag;
pub use monitor::{MonitorError, MonitorReport, MonitorRequest, PlainMonitor, ProcessMonitor, ScanMonitor};

#[derive(Debug, Error)]
pub enum EvaluateError {
  #[error("operation '{operation}' failed with exit code {code:?}")]
  OperationFailed { operation: String, code: Option<i32> },

  #[error("operation '{operation}' timed out after {timeout:?}")]
  OperationTimeout { operation: String, timeout: Duration },

  #[error("operation '{operation}' accessed undeclared paths: {}", display_paths(paths))]
  AccessViolation { operation: String, paths: Vec<PathBuf> },

  #[error("operation '{operation}' could not run: {source}")]
  Monitor {
    operation: String,
    #[source]
    source: MonitorError,
  },

  #[error("dependency cycle detected")]
  CycleDetected,

  #[error(transparent)]
  Graph(#[from] OperationGraphError),
}

fn display_paths(paths: &[PathBuf]) -> String {
  paths.iter().map(|p| p.display().to_string()).collect::<Vec<_>>().join(", ")
}

#[derive(Debug, Clone)]
pub struct EvaluateOptions {
  /// Maximum number of processes running at once.
  pub parallelism: usize,
  /// Kill an operation that runs longer than this.
  pub operation_timeout: Option<Duration>,
  /// Operations whose failure does not abort the evaluation.
  pub best_effort: BTreeSet<OperationId>,
  pub temp_directory: Option<PathBuf>,
}

impl Default for EvaluateOptions {
  fn default() -> Self {
    Self {
      parallelism: std::thread::available_parallelism().map(|p| p.get()).unwrap_or(4),
      operation_timeout: None,
      best_effort: BTreeSet::new(),
      temp_directory: None,
    }
  }
}

/// What happened to each operation during one evaluation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvaluateSummary {
  pub executed: Vec<OperationId>,
  pub up_to_date: Vec<OperationId>,
  pub failed: Vec<OperationId>,
  /// Not run because a dependency failed.
  pub skipped: Vec<OperationId>,
}

enum Outcome {
  Finished(MonitorReport),
  TimedOut(Duration),
  Failed(MonitorError),
}

impl From<Result<MonitorReport, MonitorError>> for Outcome {
  fn from(result: Result<MonitorReport, MonitorError>) -> Self {
    match result {
      Ok(report) => Outcome::Finished(report),
      Err(e) => Outcome::Failed(e),
    }
  }
}

/// Evaluate `graph`, updating `results` in place.
///
/// `results` reflects every operation that ran, including when an error is
/// returned, so callers persist it either way.
pub async fn evaluate<M: ProcessMonitor>(
  graph: &OperationGraph,
  results: &mut OperationResults,
  registry: &FileSystemRegistry,
  monitor: &Arc<M>,
  options: &EvaluateOptions,
) -> Result<EvaluateSummary, EvaluateError> {
  graph.validate()?;
  let dag = OperationDag::from_graph(graph)?;
  let waves = dag.waves()?;
  registry.clear_write_time_cache();

  info!(operations = graph.len(), wave_count = waves.len(), "Evaluating operation graph");

  let semaphore = Arc::new(Semaphore::new(options.parallelism.max(1)));
  let mut summary = EvaluateSummary::default();
  let mut blocked: HashSet<OperationId> = HashSet::new();
  let mut fatal: Option<EvaluateError> = None;

  'waves: for (wave_idx, wave) in waves.iter().enumerate() {
    let mut ready = Vec::new();

    for id in wave {
      if let Some(failed_dep) = dag.dependencies(*id).into_iter().find(|dep| blocked.contains(dep)) {
        warn!(operation = %id, failed_dep = %failed_dep, "skipping operation due to failed dependency");
        blocked.insert(*id);
        summary.skipped.push(*id);
        continue;
      }
      let Some(operation) = graph.get(*id) else {
        continue;
      };
      match out_of_date_reason(operation, results.get(id), registry) {
        Some(reason) => {
          debug!(operation = %operation.display_name(), reason, "Operation out of date");
          ready.push(operation);
        }
        None => {
          trace!(operation = %operation.display_name(), "Operation up to date");
          summary.up_to_date.push(*id);
        }
      }
    }

    for batch in partition_by_access(ready) {
      debug!(wave = wave_idx, operations = batch.len(), "executing batch");
      let outcomes = run_batch(&batch, monitor, options, &semaphore).await;

      for (operation, started, outcome) in outcomes {
        match record_outcome(operation, started, outcome, results, registry) {
          Ok(()) => {
            info!(operation = %operation.display_name(), "Operation succeeded");
            summary.executed.push(operation.id);
          }
          Err(e) => {
            blocked.insert(operation.id);
            summary.failed.push(operation.id);
            if options.best_effort.contains(&operation.id) {
              warn!(operation = %operation.display_name(), error = %e, "best effort operation failed");
            } else {
              error!(operation = %operation.display_name(), error = %e, "operation failed");
              fatal.get_or_insert(e);
            }
          }
        }
      }

      if fatal.is_some() {
        break 'waves;
      }
    }
  }

  if let Some(e) = fatal {
    return Err(e);
  }

  info!(
    executed = summary.executed.len(),
    up_to_date = summary.up_to_date.len(),
    failed = summary.failed.len(),
    skipped = summary.skipped.len(),
    "evaluation complete"
  );
  Ok(summary)
}

/// Why an operation must run, or `None` when its previous result still holds.
fn out_of_date_reason(
  operation: &OperationInfo,
  previous: Option<&OperationResult>,
  registry: &FileSystemRegistry,
) -> Option<&'static str> {
  let Some(previous) = previous else {
    return Some("no previous result");
  };
  if !previous.was_successful {
    return Some("previous execution failed");
  }

  let evaluated = truncate_to_ticks(previous.evaluate_time);
  for id in operation.declared_input.iter().chain(&previous.observed_input) {
    if let Some(written) = registry.last_write_time(*id)
      && written > evaluated
    {
      trace!(file = id.0, "Input newer than last evaluation");
      return Some("input changed");
    }
  }

  for id in operation.declared_output.iter().chain(&previous.observed_output) {
    if !registry.file_exists(*id) {
      trace!(file = id.0, "Output missing");
      return Some("output missing");
    }
  }

  None
}

/// Split operations into batches that never write where another member of
/// the same batch reads or writes.
fn partition_by_access(mut pending: Vec<&OperationInfo>) -> Vec<Vec<&OperationInfo>> {
  let mut batches = Vec::new();
  while !pending.is_empty() {
    let mut batch: Vec<&OperationInfo> = Vec::new();
    let mut deferred = Vec::new();
    for operation in pending {
      if batch.iter().any(|other| access_conflicts(operation, other)) {
        trace!(operation = %operation.display_name(), "Deferred for overlapping write access");
        deferred.push(operation);
      } else {
        batch.push(operation);
      }
    }
    batches.push(batch);
    pending = deferred;
  }
  batches
}

fn access_conflicts(a: &OperationInfo, b: &OperationInfo) -> bool {
  writes_into(a, b) || writes_into(b, a)
}

fn writes_into(writer: &OperationInfo, other: &OperationInfo) -> bool {
  writer.declared_write_access.iter().any(|write| {
    other
      .declared_read_access
      .iter()
      .chain(&other.declared_write_access)
      .any(|path| overlaps(write, path))
  })
}

async fn run_batch<'g, M: ProcessMonitor>(
  batch: &[&'g OperationInfo],
  monitor: &Arc<M>,
  options: &EvaluateOptions,
  semaphore: &Arc<Semaphore>,
) -> Vec<(&'g OperationInfo, SystemTime, Outcome)> {
  let mut join_set = JoinSet::new();
  let mut tasks = HashMap::new();

  for operation in batch {
    let request = MonitorRequest {
      command: operation.command.clone(),
      arguments: operation.arguments.clone(),
      working_directory: operation.working_directory.clone(),
      allowed_read: operation.declared_read_access.iter().cloned().collect(),
      allowed_write: operation.declared_write_access.iter().cloned().collect(),
      temp_directory: options.temp_directory.clone(),
    };
    let monitor = Arc::clone(monitor);
    let semaphore = Arc::clone(semaphore);
    let timeout = options.operation_timeout;

    info!(operation = %operation.display_name(), "Execute operation");
    let handle = join_set.spawn(async move {
      let Ok(_permit) = semaphore.acquire_owned().await else {
        return (now(), Outcome::Failed(MonitorError::Closed));
      };
      let started = now();
      let run = monitor.run_monitored(request);
      let outcome = match timeout {
        Some(limit) => match tokio::time::timeout(limit, run).await {
          Ok(result) => result.into(),
          Err(_) => Outcome::TimedOut(limit),
        },
        None => run.await.into(),
      };
      (started, outcome)
    });
    tasks.insert(handle.id(), *operation);
  }

  let mut outcomes = Vec::new();
  while let Some(joined) = join_set.join_next_with_id().await {
    match joined {
      Ok((task, (started, outcome))) => {
        if let Some(operation) = tasks.get(&task) {
          outcomes.push((*operation, started, outcome));
        }
      }
      Err(e) => {
        error!(error = %e, "operation task panicked");
        if let Some(operation) = tasks.get(&e.id()) {
          outcomes.push((*operation, now(), Outcome::Failed(MonitorError::Task(e))));
        }
      }
    }
  }

  outcomes.sort_by_key(|(operation, _, _)| operation.id);
  outcomes
}

/// Store the result of one execution and turn failures into errors.
fn record_outcome(
  operation: &OperationInfo,
  started: SystemTime,
  outcome: Outcome,
  results: &mut OperationResults,
  registry: &FileSystemRegistry,
) -> Result<(), EvaluateError> {
  registry.refresh(operation.declared_output.iter().copied());
  let operation_name = operation.display_name();

  let report = match outcome {
    Outcome::Finished(report) => report,
    Outcome::TimedOut(timeout) => {
      results.insert(operation.id, failed_result(started));
      return Err(EvaluateError::OperationTimeout {
        operation: operation_name,
        timeout,
      });
    }
    Outcome::Failed(source) => {
      results.insert(operation.id, failed_result(started));
      return Err(EvaluateError::Monitor {
        operation: operation_name,
        source,
      });
    }
  };

  let working_directory = &operation.working_directory;
  let observed_output: BTreeSet<FileId> = report
    .observed_writes
    .iter()
    .map(|path| registry.to_file_id(&monitor::resolve_observed(working_directory, path)))
    .collect();
  let observed_input: BTreeSet<FileId> = report
    .observed_reads
    .iter()
    .map(|path| registry.to_file_id(&monitor::resolve_observed(working_directory, path)))
    .filter(|id| !observed_output.contains(id))
    .collect();
  registry.refresh(observed_output.iter().copied());

  let succeeded = report.succeeded() && report.violations.is_empty();
  results.insert(
    operation.id,
    OperationResult {
      was_successful: succeeded,
      evaluate_time: started,
      observed_input,
      observed_output,
    },
  );

  if !report.violations.is_empty() {
    return Err(EvaluateError::AccessViolation {
      operation: operation_name,
      paths: report.violations,
    });
  }
  if !report.succeeded() {
    return Err(EvaluateError::OperationFailed {
      operation: operation_name,
      code: report.exit_code,
    });
  }
  Ok(())
}

fn failed_result(started: SystemTime) -> OperationResult {
  OperationResult {
    was_successful: false,
    evaluate_time: started,
    observed_input: BTreeSet::new(),
    observed_output: BTreeSet::new(),
  }
}
