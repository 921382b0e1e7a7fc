use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::SystemTime;

use tracing::{debug, info, trace, warn};

use super::codec::{decode_file_system_state, encode_file_system_state};
use super::{FileId, FileSystemState};
use crate::codec::{CodecError, read_file_optional, write_file_atomic};
use crate::util::path::normalize;
use crate::util::time::{to_file_ticks, truncate_to_ticks};

/// Thread-safe path ↔ [`FileId`] registry with a per-pass write-time cache.
///
/// One registry is created per build run and shared (by reference) with every
/// graph load, evaluate and results write. Allocation of new ids happens under
/// a single lock so concurrent operations never race on the same id.
#[derive(Debug)]
pub struct FileSystemRegistry {
  inner: Mutex<RegistryInner>,
}

#[derive(Debug)]
struct RegistryInner {
  state: FileSystemState,
  lookup: HashMap<PathBuf, FileId>,
  /// `None` records that the file did not exist when queried.
  write_times: HashMap<FileId, Option<SystemTime>>,
  dirty: bool,
}

impl FileSystemRegistry {
  /// Create an empty registry with the given generation id.
  pub fn new(id: u32) -> Self {
    Self::from_state(FileSystemState {
      id,
      max_file_id: 0,
      files: BTreeMap::new(),
    })
  }

  pub fn from_state(state: FileSystemState) -> Self {
    let lookup = state.files.iter().map(|(id, path)| (path.clone(), *id)).collect();
    Self {
      inner: Mutex::new(RegistryInner {
        state,
        lookup,
        write_times: HashMap::new(),
        dirty: false,
      }),
    }
  }

  /// Load the registry file, starting fresh when it is missing or unreadable.
  ///
  /// A corrupt registry invalidates every id stored next to it, which the
  /// callers handle by treating graph and result files that fail to remap as
  /// absent.
  pub fn load_or_create(path: &Path) -> Result<Self, CodecError> {
    let Some(bytes) = read_file_optional(path)? else {
      info!(path = %path.display(), "File system state does not exist");
      return Ok(Self::new(new_registry_id()));
    };

    match decode_file_system_state(&bytes) {
      Ok(state) => {
        debug!(path = %path.display(), files = state.files.len(), "File system state loaded");
        Ok(Self::from_state(state))
      }
      Err(e) => {
        warn!(path = %path.display(), error = %e, "File system state corrupted, starting fresh");
        Ok(Self::new(new_registry_id()))
      }
    }
  }

  /// Persist the registry. Clears the dirty flag on success.
  pub fn save(&self, path: &Path) -> Result<(), CodecError> {
    let mut inner = self.inner();
    let bytes = encode_file_system_state(&inner.state)?;
    write_file_atomic(path, &bytes)?;
    inner.dirty = false;
    debug!(path = %path.display(), files = inner.state.files.len(), "File system state saved");
    Ok(())
  }

  pub fn snapshot(&self) -> FileSystemState {
    self.inner().state.clone()
  }

  pub fn id(&self) -> u32 {
    self.inner().state.id
  }

  /// True when ids were allocated since the last load or save.
  pub fn is_dirty(&self) -> bool {
    self.inner().dirty
  }

  pub fn len(&self) -> usize {
    self.inner().state.files.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Return the id for `path`, allocating the next id if it is new.
  ///
  /// Paths are normalized lexically; callers pass absolute paths.
  pub fn to_file_id(&self, path: &Path) -> FileId {
    let path = normalize(path);
    let mut inner = self.inner();
    if let Some(id) = inner.lookup.get(&path) {
      return *id;
    }

    inner.state.max_file_id += 1;
    let id = FileId(inner.state.max_file_id);
    trace!(id = id.0, path = %path.display(), "Allocated file id");
    inner.state.files.insert(id, path.clone());
    inner.lookup.insert(path, id);
    inner.dirty = true;
    id
  }

  pub fn find_file_id(&self, path: &Path) -> Option<FileId> {
    self.inner().lookup.get(&normalize(path)).copied()
  }

  pub fn path(&self, id: FileId) -> Option<PathBuf> {
    self.inner().state.files.get(&id).cloned()
  }

  /// Last write time of a file at tick resolution, or `None` if it does not
  /// exist. Cached until [`refresh`](Self::refresh) or
  /// [`clear_write_time_cache`](Self::clear_write_time_cache).
  pub fn last_write_time(&self, id: FileId) -> Option<SystemTime> {
    let mut inner = self.inner();
    if let Some(cached) = inner.write_times.get(&id) {
      return *cached;
    }

    let time = match inner.state.files.get(&id) {
      Some(path) => query_write_time(path),
      None => {
        warn!(id = id.0, "Write time requested for unknown file id");
        None
      }
    };
    inner.write_times.insert(id, time);
    time
  }

  pub fn file_exists(&self, id: FileId) -> bool {
    self.last_write_time(id).is_some()
  }

  /// Drop cached write times for files that were just written.
  pub fn refresh<I>(&self, ids: I)
  where
    I: IntoIterator<Item = FileId>,
  {
    let mut inner = self.inner();
    for id in ids {
      inner.write_times.remove(&id);
    }
  }

  /// Start a new evaluate pass.
  pub fn clear_write_time_cache(&self) {
    self.inner().write_times.clear();
  }

  /// Map a file table read from another state file into this registry.
  ///
  /// Returns the translation from the file's own ids to registry ids,
  /// allocating ids for paths this registry has not seen.
  pub fn import_file_table(&self, entries: &[(u32, PathBuf)]) -> HashMap<u32, FileId> {
    entries
      .iter()
      .map(|(foreign, path)| (*foreign, self.to_file_id(path)))
      .collect()
  }

  /// Collect the `(id, path)` table for the given ids, sorted by id.
  pub fn export_file_table<I>(&self, ids: I) -> Result<Vec<(FileId, PathBuf)>, CodecError>
  where
    I: IntoIterator<Item = FileId>,
  {
    let inner = self.inner();
    let mut table = BTreeMap::new();
    for id in ids {
      let path = inner.state.files.get(&id).ok_or(CodecError::UnknownFileId(id.0))?;
      table.insert(id, path.clone());
    }
    Ok(table.into_iter().collect())
  }

  fn inner(&self) -> MutexGuard<'_, RegistryInner> {
    self.inner.lock().unwrap_or_else(PoisonError::into_inner)
  }
}

fn query_write_time(path: &Path) -> Option<SystemTime> {
  match fs::metadata(path).and_then(|m| m.modified()) {
    Ok(time) => Some(truncate_to_ticks(time)),
    Err(e) if e.kind() == io::ErrorKind::NotFound => None,
    Err(e) => {
      debug!(path = %path.display(), error = %e, "Failed to query write time, treating as missing");
      None
    }
  }
}

fn new_registry_id() -> u32 {
  // Low bits of the current tick count; only needs to differ between
  // registries that could be confused with one another.
  (to_file_ticks(SystemTime::now()) & u64::from(u32::MAX)) as u32
}
