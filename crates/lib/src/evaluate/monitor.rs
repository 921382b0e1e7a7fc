//! Running operation processes and reporting what they touched.
//!
//! [`PlainMonitor`] runs the process and observes nothing. [`ScanMonitor`]
//! approximates observed writes by comparing modification times before and
//! after the process runs.

use std::collections::HashMap;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::SystemTime;

use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, trace, warn};
use walkdir::WalkDir;

/// One process to run on behalf of an operation.
#[derive(Debug, Clone)]
pub struct MonitorRequest {
  pub command: String,
  pub arguments: Vec<String>,
  pub working_directory: PathBuf,
  pub allowed_read: Vec<PathBuf>,
  pub allowed_write: Vec<PathBuf>,
  /// Exposed to the process as `TMP`, `TEMP` and `TMPDIR`.
  pub temp_directory: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MonitorReport {
  /// `None` when the process was terminated by a signal.
  pub exit_code: Option<i32>,
  pub observed_reads: Vec<PathBuf>,
  pub observed_writes: Vec<PathBuf>,
  /// Paths accessed outside the declared read/write access.
  pub violations: Vec<PathBuf>,
}

impl MonitorReport {
  pub fn succeeded(&self) -> bool {
    self.exit_code == Some(0)
  }
}

#[derive(Debug, Error)]
pub enum MonitorError {
  #[error("failed to start '{command}': {source}")]
  Spawn {
    command: String,
    #[source]
    source: io::Error,
  },

  #[error("process monitor task failed: {0}")]
  Task(#[from] tokio::task::JoinError),

  #[error("process monitor is shut down")]
  Closed,
}

/// Runs operation processes.
pub trait ProcessMonitor: Send + Sync + 'static {
  fn run_monitored(&self, request: MonitorRequest) -> impl Future<Output = Result<MonitorReport, MonitorError>> + Send;
}

/// Runs the process without observing file access.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainMonitor;

impl ProcessMonitor for PlainMonitor {
  async fn run_monitored(&self, request: MonitorRequest) -> Result<MonitorReport, MonitorError> {
    let exit_code = run_process(&request).await?;
    Ok(MonitorReport {
      exit_code,
      ..MonitorReport::default()
    })
  }
}

/// Observes writes by diffing modification times under the declared write
/// access and the working directory. Writes outside the declared write access
/// are reported as violations. Reads are not observed.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScanMonitor;

impl ProcessMonitor for ScanMonitor {
  async fn run_monitored(&self, request: MonitorRequest) -> Result<MonitorReport, MonitorError> {
    let mut roots = request.allowed_write.clone();
    if !roots.iter().any(|root| request.working_directory.starts_with(root)) {
      roots.push(request.working_directory.clone());
    }

    let scan_roots = roots.clone();
    let before = tokio::task::spawn_blocking(move || scan(&scan_roots)).await?;
    let exit_code = run_process(&request).await?;
    let after = tokio::task::spawn_blocking(move || scan(&roots)).await?;

    let mut report = MonitorReport {
      exit_code,
      ..MonitorReport::default()
    };
    for (path, modified) in after {
      if before.get(&path) == Some(&modified) {
        continue;
      }
      if let Some(temp) = &request.temp_directory
        && path.starts_with(temp)
      {
        continue;
      }
      if request.allowed_write.iter().any(|allowed| path.starts_with(allowed)) {
        report.observed_writes.push(path);
      } else {
        warn!(path = %path.display(), "Write outside declared access");
        report.violations.push(path);
      }
    }
    report.observed_writes.sort();
    report.violations.sort();
    trace!(writes = report.observed_writes.len(), "Scan complete");
    Ok(report)
  }
}

/// Modification time of every file under `roots`. Unreadable entries are
/// skipped.
fn scan(roots: &[PathBuf]) -> HashMap<PathBuf, SystemTime> {
  let mut files = HashMap::new();
  for root in roots {
    for entry in WalkDir::new(root).into_iter().filter_map(Result::ok) {
      if !entry.file_type().is_file() {
        continue;
      }
      if let Ok(modified) = entry.metadata().map_err(io::Error::from).and_then(|m| m.modified()) {
        files.insert(entry.into_path(), modified);
      }
    }
  }
  files
}

async fn run_process(request: &MonitorRequest) -> Result<Option<i32>, MonitorError> {
  let mut command = Command::new(&request.command);
  command
    .args(&request.arguments)
    .current_dir(&request.working_directory)
    .stdin(Stdio::null())
    .kill_on_drop(true);

  if let Some(temp) = &request.temp_directory {
    command.env("TMP", temp).env("TEMP", temp).env("TMPDIR", temp);
  }

  debug!(
    command = %request.command,
    working_dir = %request.working_directory.display(),
    "spawning process"
  );

  let output = command.output().await.map_err(|source| MonitorError::Spawn {
    command: request.command.clone(),
    source,
  })?;

  let stdout = String::from_utf8_lossy(&output.stdout);
  let stderr = String::from_utf8_lossy(&output.stderr);
  if !stdout.trim().is_empty() {
    debug!(stdout = %stdout.trim(), "command stdout");
  }
  if !stderr.trim().is_empty() {
    if output.status.success() {
      debug!(stderr = %stderr.trim(), "command stderr");
    } else {
      warn!(stderr = %stderr.trim(), "command stderr");
    }
  }

  Ok(output.status.code())
}

/// Resolve a reported path against the process working directory.
pub(super) fn resolve_observed(working_directory: &Path, path: &Path) -> PathBuf {
  crate::util::path::absolutize(working_directory, path)
}
