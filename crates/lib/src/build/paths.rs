use std::path::{Path, PathBuf};

use crate::consts::{
  FILE_SYSTEM_STATE_FILENAME, GENERATE_GRAPH_FILENAME, GENERATE_INPUT_FILENAME, OPERATION_GRAPH_FILENAME,
  OPERATION_RESULTS_FILENAME, SOUP_DIR, STATE_DIR, TEMP_DIR,
};

/// State files kept in a package's target directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageStatePaths {
  pub soup_directory: PathBuf,
  pub temp_directory: PathBuf,
  pub generate_input: PathBuf,
  pub generate_graph: PathBuf,
  pub operation_graph: PathBuf,
  pub operation_results: PathBuf,
}

impl PackageStatePaths {
  pub fn new(target_directory: &Path) -> Self {
    let soup_directory = target_directory.join(SOUP_DIR);
    Self {
      temp_directory: target_directory.join(TEMP_DIR),
      generate_input: soup_directory.join(GENERATE_INPUT_FILENAME),
      generate_graph: soup_directory.join(GENERATE_GRAPH_FILENAME),
      operation_graph: soup_directory.join(OPERATION_GRAPH_FILENAME),
      operation_results: soup_directory.join(OPERATION_RESULTS_FILENAME),
      soup_directory,
    }
  }
}

/// The file registry shared by every package built from one state root.
pub fn registry_file(state_root: &Path) -> PathBuf {
  state_root.join(STATE_DIR).join(FILE_SYSTEM_STATE_FILENAME)
}
