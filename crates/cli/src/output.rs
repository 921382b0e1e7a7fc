//! Terminal output for the `soup` commands.
//!
//! Status lines go to stdout, warnings to stderr. Colors are only used when
//! the stream supports them.

use std::time::Duration;

use anyhow::Context;
use owo_colors::{OwoColorize, Stream};
use soup_lib::build::BuildSummary;
use soup_lib::package::DependencyKind;

pub mod symbols {
  pub const SUCCESS: &str = "✓";
  pub const WARNING: &str = "⚠";
  pub const INFO: &str = "•";
  pub const ARROW: &str = "→";
}

/// Size of a state file, e.g. "412 B" or "3.2 KB".
pub fn format_bytes(bytes: u64) -> String {
  const UNITS: [&str; 3] = ["KB", "MB", "GB"];
  if bytes < 1024 {
    return format!("{bytes} B");
  }
  let mut size = bytes as f64 / 1024.0;
  let mut unit = 0;
  while size >= 1024.0 && unit + 1 < UNITS.len() {
    size /= 1024.0;
    unit += 1;
  }
  format!("{:.1} {}", size, UNITS[unit])
}

pub fn format_duration(duration: Duration) -> String {
  let secs = duration.as_secs();
  let millis = duration.subsec_millis();

  match secs {
    0 => format!("{millis}ms"),
    1..60 => format!("{}.{:02}s", secs, millis / 10),
    _ => format!("{}m {}s", secs / 60, secs % 60),
  }
}

/// "1 operation", "3 operations".
pub fn format_count(count: usize, noun: &str) -> String {
  if count == 1 {
    format!("1 {noun}")
  } else {
    format!("{count} {noun}s")
  }
}

/// Heading line for one package in the graph listing.
pub fn package_line(name: &str, version: Option<&str>, prebuilt: bool) -> String {
  let mut line = name.to_string();
  if let Some(version) = version {
    line.push(' ');
    line.push_str(version);
  }
  if prebuilt {
    line.push_str(" [prebuilt]");
  }
  line
}

pub fn print_success(message: &str) {
  println!(
    "{} {}",
    symbols::SUCCESS.if_supports_color(Stream::Stdout, |s| s.green()),
    message
  );
}

pub fn print_warning(message: &str) {
  eprintln!(
    "{} {}",
    symbols::WARNING.if_supports_color(Stream::Stderr, |s| s.yellow()),
    message.if_supports_color(Stream::Stderr, |s| s.yellow())
  );
}

pub fn print_info(message: &str) {
  println!(
    "{} {}",
    symbols::INFO.if_supports_color(Stream::Stdout, |s| s.blue()),
    message
  );
}

pub fn print_stat(label: &str, value: &str) {
  println!(
    "  {}: {}",
    label.if_supports_color(Stream::Stdout, |s| s.dimmed()),
    value
  );
}

/// One dependency edge under a package in the graph listing.
pub fn print_dependency(kind: DependencyKind, reference: &str, target: &str) {
  println!(
    "      {} {} {} {}",
    symbols::ARROW,
    kind.as_str().if_supports_color(Stream::Stdout, |s| s.dimmed()),
    reference,
    target.if_supports_color(Stream::Stdout, |s| s.dimmed())
  );
}

/// Result block printed after `soup build`.
pub fn print_build_summary(summary: &BuildSummary, elapsed: Duration) {
  let executed = summary.operations_executed;
  if executed == 0 {
    print_success(&format!("Up to date ({})", format_duration(elapsed)));
  } else {
    print_success(&format!(
      "Build complete in {}: {} run",
      format_duration(elapsed),
      format_count(executed, "operation")
    ));
  }
  print_stat("Packages built", &summary.packages_built.to_string());
  print_stat("Packages prebuilt", &summary.packages_prebuilt.to_string());
  print_stat("Operations executed", &executed.to_string());
  print_stat("Operations up to date", &summary.operations_up_to_date.to_string());
}

pub fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
  let json = serde_json::to_string_pretty(value).context("Failed to serialize to JSON")?;
  println!("{}", json);
  Ok(())
}
