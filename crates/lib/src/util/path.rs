//! Lexical path helpers.
//!
//! The file registry keys files by absolute, normalized path. Normalization is
//! purely lexical so that files which do not exist yet (declared outputs) get
//! stable identities.

use std::path::{Component, Path, PathBuf};

/// Remove `.` components and resolve `..` against preceding components.
pub fn normalize(path: &Path) -> PathBuf {
  let mut out = PathBuf::new();
  for component in path.components() {
    match component {
      Component::CurDir => {}
      Component::ParentDir => {
        let popped = match out.components().next_back() {
          Some(Component::Normal(_)) => out.pop(),
          Some(Component::RootDir) | Some(Component::Prefix(_)) => true,
          _ => false,
        };
        if !popped {
          out.push("..");
        }
      }
      other => out.push(other.as_os_str()),
    }
  }
  out
}

/// Resolve `path` against `base` when relative, then normalize.
pub fn absolutize(base: &Path, path: &Path) -> PathBuf {
  if path.is_absolute() {
    normalize(path)
  } else {
    normalize(&base.join(path))
  }
}

/// True when one path is equal to or contains the other.
pub fn overlaps(a: &Path, b: &Path) -> bool {
  a.starts_with(b) || b.starts_with(a)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn normalize_removes_dots() {
    assert_eq!(normalize(Path::new("/a/./b/../c")), PathBuf::from("/a/c"));
  }

  #[test]
  fn normalize_keeps_leading_parent_of_relative_path() {
    assert_eq!(normalize(Path::new("../x/./y")), PathBuf::from("../x/y"));
  }

  #[test]
  fn normalize_does_not_climb_above_root() {
    assert_eq!(normalize(Path::new("/../a")), PathBuf::from("/a"));
  }

  #[test]
  fn absolutize_joins_relative_paths() {
    assert_eq!(
      absolutize(Path::new("/work/pkg"), Path::new("../Other")),
      PathBuf::from("/work/Other")
    );
    assert_eq!(absolutize(Path::new("/work"), Path::new("/abs/x")), PathBuf::from("/abs/x"));
  }

  #[test]
  fn overlap_is_component_wise() {
    assert!(overlaps(Path::new("/out/obj"), Path::new("/out")));
    assert!(overlaps(Path::new("/out"), Path::new("/out/obj/a.o")));
    assert!(!overlaps(Path::new("/out/obj"), Path::new("/out/objects")));
  }
}
