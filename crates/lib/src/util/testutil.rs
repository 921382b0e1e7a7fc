//! Test utilities for soup-lib.
//!
//! Cross-platform helpers for tests that need to run small shell commands as
//! build operations.

/// Returns the shell command and args to execute a shell script.
#[cfg(unix)]
pub fn shell_cmd(script: &str) -> (String, Vec<String>) {
  ("/bin/sh".to_string(), vec!["-c".to_string(), script.to_string()])
}

#[cfg(windows)]
pub fn shell_cmd(script: &str) -> (String, Vec<String>) {
  ("cmd.exe".to_string(), vec!["/C".to_string(), script.to_string()])
}

/// Returns the command and args to create a file in the working directory.
#[cfg(unix)]
pub fn touch_file(filename: &str) -> (String, Vec<String>) {
  ("/usr/bin/touch".to_string(), vec![filename.to_string()])
}

#[cfg(windows)]
pub fn touch_file(filename: &str) -> (String, Vec<String>) {
  (
    "powershell.exe".to_string(),
    vec![
      "-NoProfile".to_string(),
      "-Command".to_string(),
      format!("New-Item -ItemType File -Path '{}' -Force | Out-Null", filename),
    ],
  )
}

/// Returns the command and args for a process that exits with `code`.
#[cfg(unix)]
pub fn exit_with(code: i32) -> (String, Vec<String>) {
  shell_cmd(&format!("exit {}", code))
}

#[cfg(windows)]
pub fn exit_with(code: i32) -> (String, Vec<String>) {
  shell_cmd(&format!("exit /B {}", code))
}
