//! BOG (operation graph) and BOR (operation results) files.
//!
//! Both embed a `FIS` file table holding only the files they reference.
//! Ids inside the file are private to it; decoding remaps them into the
//! active [`FileSystemRegistry`]. The remap happens only once the whole file
//! has been read, so a rejected file never allocates registry ids.
//!
//! ```text
//! "BOG\0" u32(version=1) <file table>
//!   "ROP\0" u32(n) u32(opId)×n
//!   "OPS\0" u32(n) { u32(id) str(title) str(command) u32(n) str×n
//!                    str(workingDirectory) u32(n) u32×n u32(n) u32×n
//!                    u32(n) str×n u32(n) str×n u32(n) u32×n }×n
//!
//! "BOR\0" u32(version=2) <file table>
//!   "RTS\0" u32(n) { u32(opId) u32(ok) u64(ticks) u32(n) u32×n u32(n) u32×n }×n
//! ```

use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};

use tracing::debug;

use super::graph::{OperationGraph, OperationId, OperationInfo};
use super::results::{OperationResult, OperationResults};
use crate::codec::{
  BinaryReader, BinaryWriter, CodecError, Magic, OPERATION_GRAPH_MAGIC as GRAPH_MAGIC,
  OPERATION_RESULTS_MAGIC as RESULTS_MAGIC, read_file_optional, write_file_atomic,
};
use crate::fs_state::{FileId, FileSystemRegistry, read_file_table, write_file_table};
use crate::util::time::{from_file_ticks, to_file_ticks};

const GRAPH_VERSION: u32 = 1;
const ROOTS_MAGIC: Magic = *b"ROP\0";
const OPERATIONS_MAGIC: Magic = *b"OPS\0";

const RESULTS_VERSION: u32 = 2;
const RESULT_ENTRIES_MAGIC: Magic = *b"RTS\0";

pub fn encode_operation_graph(
  graph: &OperationGraph,
  registry: &FileSystemRegistry,
) -> Result<Vec<u8>, CodecError> {
  let mut writer = BinaryWriter::new();
  writer.write_magic(&GRAPH_MAGIC);
  writer.write_u32(GRAPH_VERSION);
  let files = registry.export_file_table(graph.referenced_file_ids())?;
  write_file_table(&mut writer, &files)?;

  writer.write_magic(&ROOTS_MAGIC);
  writer.write_len(graph.root_operation_ids.len())?;
  for id in &graph.root_operation_ids {
    writer.write_u32(id.0);
  }

  writer.write_magic(&OPERATIONS_MAGIC);
  writer.write_len(graph.operations.len())?;
  for operation in graph.operations.values() {
    writer.write_u32(operation.id.0);
    writer.write_str(&operation.title)?;
    writer.write_str(&operation.command)?;
    writer.write_len(operation.arguments.len())?;
    for argument in &operation.arguments {
      writer.write_str(argument)?;
    }
    writer.write_path(&operation.working_directory)?;
    write_file_ids(&mut writer, &operation.declared_input)?;
    write_file_ids(&mut writer, &operation.declared_output)?;
    write_paths(&mut writer, &operation.declared_read_access)?;
    write_paths(&mut writer, &operation.declared_write_access)?;
    writer.write_len(operation.children.len())?;
    for child in &operation.children {
      writer.write_u32(child.0);
    }
  }

  Ok(writer.into_bytes())
}

pub fn decode_operation_graph(
  bytes: &[u8],
  registry: &FileSystemRegistry,
) -> Result<OperationGraph, CodecError> {
  let mut reader = BinaryReader::new(bytes);
  reader.expect_magic(&GRAPH_MAGIC)?;
  reader.expect_version(GRAPH_VERSION)?;
  let table = read_file_table(&mut reader)?;
  let known = local_ids(&table);

  reader.expect_magic(&ROOTS_MAGIC)?;
  let root_count = reader.read_u32("root operation count")?;
  let mut root_operation_ids = Vec::new();
  for _ in 0..root_count {
    root_operation_ids.push(OperationId(reader.read_u32("root operation id")?));
  }

  reader.expect_magic(&OPERATIONS_MAGIC)?;
  let operation_count = reader.read_u32("operation count")?;
  let mut graph = OperationGraph {
    root_operation_ids,
    ..OperationGraph::default()
  };
  for _ in 0..operation_count {
    let id = OperationId(reader.read_u32("operation id")?);
    let title = reader.read_string("operation title")?;
    let command = reader.read_string("operation command")?;
    let argument_count = reader.read_u32("argument count")?;
    let mut arguments = Vec::new();
    for _ in 0..argument_count {
      arguments.push(reader.read_string("argument")?);
    }
    let working_directory = reader.read_path("working directory")?;
    let declared_input = read_file_ids(&mut reader, &known)?;
    let declared_output = read_file_ids(&mut reader, &known)?;
    let declared_read_access = read_paths(&mut reader)?;
    let declared_write_access = read_paths(&mut reader)?;
    let child_count = reader.read_u32("child count")?;
    let mut children = BTreeSet::new();
    for _ in 0..child_count {
      children.insert(OperationId(reader.read_u32("child id")?));
    }

    graph.operations.insert(
      id,
      OperationInfo {
        id,
        title,
        command,
        arguments,
        working_directory,
        declared_input,
        declared_output,
        declared_read_access,
        declared_write_access,
        children,
      },
    );
  }
  reader.finish()?;

  let files = registry.import_file_table(&table);
  for operation in graph.operations.values_mut() {
    operation.declared_input = remap(&operation.declared_input, &files);
    operation.declared_output = remap(&operation.declared_output, &files);
  }
  Ok(graph)
}

pub fn encode_operation_results(
  results: &OperationResults,
  registry: &FileSystemRegistry,
) -> Result<Vec<u8>, CodecError> {
  let referenced = results
    .values()
    .flat_map(|r| r.observed_input.iter().chain(r.observed_output.iter()))
    .copied();

  let mut writer = BinaryWriter::new();
  writer.write_magic(&RESULTS_MAGIC);
  writer.write_u32(RESULTS_VERSION);
  let files = registry.export_file_table(referenced)?;
  write_file_table(&mut writer, &files)?;

  writer.write_magic(&RESULT_ENTRIES_MAGIC);
  writer.write_len(results.len())?;
  for (id, result) in results {
    writer.write_u32(id.0);
    writer.write_bool(result.was_successful);
    writer.write_u64(to_file_ticks(result.evaluate_time));
    write_file_ids(&mut writer, &result.observed_input)?;
    write_file_ids(&mut writer, &result.observed_output)?;
  }

  Ok(writer.into_bytes())
}

pub fn decode_operation_results(
  bytes: &[u8],
  registry: &FileSystemRegistry,
) -> Result<OperationResults, CodecError> {
  let mut reader = BinaryReader::new(bytes);
  reader.expect_magic(&RESULTS_MAGIC)?;
  reader.expect_version(RESULTS_VERSION)?;
  let table = read_file_table(&mut reader)?;
  let known = local_ids(&table);

  reader.expect_magic(&RESULT_ENTRIES_MAGIC)?;
  let count = reader.read_u32("result count")?;
  let mut results = OperationResults::new();
  for _ in 0..count {
    let id = OperationId(reader.read_u32("operation id")?);
    let was_successful = reader.read_bool("was successful")?;
    let evaluate_time = from_file_ticks(reader.read_u64("evaluate time")?);
    let observed_input = read_file_ids(&mut reader, &known)?;
    let observed_output = read_file_ids(&mut reader, &known)?;
    results.insert(
      id,
      OperationResult {
        was_successful,
        evaluate_time,
        observed_input,
        observed_output,
      },
    );
  }
  reader.finish()?;

  let files = registry.import_file_table(&table);
  for result in results.values_mut() {
    result.observed_input = remap(&result.observed_input, &files);
    result.observed_output = remap(&result.observed_output, &files);
  }
  Ok(results)
}

/// Read a graph file; a missing file means there is no previous graph.
pub fn read_operation_graph(
  path: &Path,
  registry: &FileSystemRegistry,
) -> Result<Option<OperationGraph>, CodecError> {
  match read_file_optional(path)? {
    Some(bytes) => decode_operation_graph(&bytes, registry).map(Some),
    None => Ok(None),
  }
}

pub fn write_operation_graph(
  path: &Path,
  graph: &OperationGraph,
  registry: &FileSystemRegistry,
) -> Result<(), CodecError> {
  debug!(path = %path.display(), operations = graph.len(), "Writing operation graph");
  write_file_atomic(path, &encode_operation_graph(graph, registry)?)
}

/// Read a results file; a missing file means there are no prior results.
pub fn read_operation_results(
  path: &Path,
  registry: &FileSystemRegistry,
) -> Result<Option<OperationResults>, CodecError> {
  match read_file_optional(path)? {
    Some(bytes) => decode_operation_results(&bytes, registry).map(Some),
    None => Ok(None),
  }
}

pub fn write_operation_results(
  path: &Path,
  results: &OperationResults,
  registry: &FileSystemRegistry,
) -> Result<(), CodecError> {
  debug!(path = %path.display(), results = results.len(), "Writing operation results");
  write_file_atomic(path, &encode_operation_results(results, registry)?)
}

fn write_file_ids(writer: &mut BinaryWriter, ids: &BTreeSet<FileId>) -> Result<(), CodecError> {
  writer.write_len(ids.len())?;
  for id in ids {
    writer.write_u32(id.0);
  }
  Ok(())
}

fn local_ids(table: &[(u32, PathBuf)]) -> HashSet<u32> {
  table.iter().map(|(id, _)| *id).collect()
}

/// Read a set of ids that are still local to the file being decoded.
fn read_file_ids(reader: &mut BinaryReader<'_>, known: &HashSet<u32>) -> Result<BTreeSet<FileId>, CodecError> {
  let count = reader.read_u32("file id count")?;
  let mut ids = BTreeSet::new();
  for _ in 0..count {
    let raw = reader.read_u32("file id")?;
    if !known.contains(&raw) {
      return Err(CodecError::UnknownFileId(raw));
    }
    ids.insert(FileId(raw));
  }
  Ok(ids)
}

/// Translate file-local ids into registry ids. Every id was checked against
/// the file table while reading.
fn remap(ids: &BTreeSet<FileId>, files: &HashMap<u32, FileId>) -> BTreeSet<FileId> {
  ids.iter().filter_map(|local| files.get(&local.0).copied()).collect()
}

fn write_paths(writer: &mut BinaryWriter, paths: &BTreeSet<PathBuf>) -> Result<(), CodecError> {
  writer.write_len(paths.len())?;
  for path in paths {
    writer.write_path(path)?;
  }
  Ok(())
}

fn read_paths(reader: &mut BinaryReader<'_>) -> Result<BTreeSet<PathBuf>, CodecError> {
  let count = reader.read_u32("path count")?;
  let mut paths = BTreeSet::new();
  for _ in 0..count {
    paths.insert(reader.read_path("access path")?);
  }
  Ok(paths)
}
