//! Well-known names shared across the crate.

/// Application name used for platform directories.
pub const APP_NAME: &str = "soup";

/// Global configuration file name inside the platform config directory.
pub const CONFIG_FILENAME: &str = "config.toml";

/// Manifest file name inside every package directory.
pub const RECIPE_FILENAME: &str = "Recipe.toml";

/// Lock file name, looked up next to a recipe.
pub const LOCK_FILENAME: &str = "PackageLock.toml";

/// Per-package build state directory inside the target directory.
pub const SOUP_DIR: &str = ".soup";

/// Transient evaluate scratch directory inside the target directory.
pub const TEMP_DIR: &str = "temp";

/// Length of the truncated parameter hash used in target directory names.
pub const PARAMETER_HASH_LEN: usize = 16;

pub const GENERATE_INPUT_FILENAME: &str = "GenerateInput.bvt";
pub const GENERATE_GRAPH_FILENAME: &str = "GenerateGraph.bog";
pub const OPERATION_GRAPH_FILENAME: &str = "OperationGraph.bog";
pub const OPERATION_RESULTS_FILENAME: &str = "OperationResults.bor";
pub const FILE_SYSTEM_STATE_FILENAME: &str = "FileSystemState.bin";

/// Directory under the state root holding the file system state.
pub const STATE_DIR: &str = "State";
