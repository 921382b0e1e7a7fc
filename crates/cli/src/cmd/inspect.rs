//! Implementation of the `soup inspect` command.
//!
//! Decodes any of the binary state files, telling them apart by magic. File
//! ids inside graph and result files are private to the file, so they are
//! shown as paths.

use std::collections::BTreeSet;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result, bail};
use serde_json::{Value as Json, json};

use soup_lib::codec::StateFileKind;
use soup_lib::fs_state::{FileId, FileSystemRegistry, decode_file_system_state};
use soup_lib::operation::{decode_operation_graph, decode_operation_results};
use soup_lib::value::decode_value_table;

use crate::output::{format_bytes, print_info, print_json, print_stat, symbols};

pub fn cmd_inspect(file: &Path, json: bool) -> Result<()> {
  let bytes = std::fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
  let Some(kind) = StateFileKind::detect(&bytes) else {
    bail!("{} is not a soup state file", file.display());
  };
  let decode_context = || format!("Failed to decode {} as {}", file.display(), kind.as_str());

  let document = match kind {
    StateFileKind::ValueTable => {
      let table = decode_value_table(&bytes).with_context(decode_context)?;
      serde_json::to_value(&table).context("Failed to serialize to JSON")?
    }
    StateFileKind::FileSystemState => {
      let state = decode_file_system_state(&bytes).with_context(decode_context)?;
      let files: Vec<Json> = state
        .files
        .iter()
        .map(|(id, path)| json!({ "id": id.0, "path": path }))
        .collect();
      json!({ "id": state.id, "max_file_id": state.max_file_id, "files": files })
    }
    StateFileKind::OperationGraph => {
      let registry = FileSystemRegistry::new(0);
      let graph = decode_operation_graph(&bytes, &registry).with_context(decode_context)?;
      let operations: Vec<Json> = graph
        .operations
        .values()
        .map(|operation| {
          json!({
            "id": operation.id.0,
            "title": operation.title,
            "command": operation.command,
            "arguments": operation.arguments,
            "working_directory": operation.working_directory,
            "declared_input": paths(&registry, &operation.declared_input),
            "declared_output": paths(&registry, &operation.declared_output),
            "declared_read_access": operation.declared_read_access,
            "declared_write_access": operation.declared_write_access,
            "children": operation.children.iter().map(|id| id.0).collect::<Vec<_>>(),
          })
        })
        .collect();
      let roots: Vec<u32> = graph.root_operation_ids.iter().map(|id| id.0).collect();
      json!({ "root_operation_ids": roots, "operations": operations })
    }
    StateFileKind::OperationResults => {
      let registry = FileSystemRegistry::new(0);
      let results = decode_operation_results(&bytes, &registry).with_context(decode_context)?;
      let entries: Vec<Json> = results
        .iter()
        .map(|(id, result)| {
          json!({
            "id": id.0,
            "was_successful": result.was_successful,
            "evaluate_time": timestamp(result.evaluate_time),
            "observed_input": paths(&registry, &result.observed_input),
            "observed_output": paths(&registry, &result.observed_output),
          })
        })
        .collect();
      json!({ "results": entries })
    }
  };

  if json {
    return print_json(&document);
  }

  print_info(&format!("{} ({})", file.display(), kind.as_str()));
  print_stat("Size", &format_bytes(bytes.len() as u64));
  println!();
  print_document(&document, 0);
  Ok(())
}

fn paths(registry: &FileSystemRegistry, ids: &BTreeSet<FileId>) -> Vec<String> {
  ids
    .iter()
    .map(|id| match registry.path(*id) {
      Some(path) => path.display().to_string(),
      None => format!("<file {id}>"),
    })
    .collect()
}

fn timestamp(time: SystemTime) -> String {
  if time < UNIX_EPOCH {
    return "before 1970-01-01".to_string();
  }
  humantime::format_rfc3339_micros(time).to_string()
}

/// Indented key/value rendering of decoded state.
fn print_document(document: &Json, depth: usize) {
  let indent = "  ".repeat(depth);
  match document {
    Json::Object(map) => {
      for (key, value) in map {
        match value {
          Json::Object(_) | Json::Array(_) if !is_empty(value) => {
            println!("{indent}{key}:");
            print_document(value, depth + 1);
          }
          _ => println!("{indent}{key}: {}", scalar(value)),
        }
      }
    }
    Json::Array(items) => {
      for item in items {
        match item {
          Json::Object(_) | Json::Array(_) => {
            println!("{indent}{}", symbols::INFO);
            print_document(item, depth + 1);
          }
          _ => println!("{indent}{} {}", symbols::INFO, scalar(item)),
        }
      }
    }
    _ => println!("{indent}{}", scalar(document)),
  }
}

fn is_empty(value: &Json) -> bool {
  match value {
    Json::Object(map) => map.is_empty(),
    Json::Array(items) => items.is_empty(),
    _ => false,
  }
}

fn scalar(value: &Json) -> String {
  match value {
    Json::String(text) => text.clone(),
    Json::Array(_) => "[]".to_string(),
    Json::Object(_) => "{}".to_string(),
    other => other.to_string(),
  }
}
