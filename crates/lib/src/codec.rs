//! Little-endian primitives shared by the binary state file formats.
//!
//! Every state file starts with a 4-byte magic and a `u32` format version,
//! followed by count-prefixed sections. Files are read fully into memory and
//! decoded from a slice so that trailing garbage can be detected once the
//! declared structure has been consumed.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;

/// Four-byte section or file marker, e.g. `b"BFS\0"`.
pub type Magic = [u8; 4];

pub const VALUE_TABLE_MAGIC: Magic = *b"BVT\0";
pub const FILE_SYSTEM_STATE_MAGIC: Magic = *b"BFS\0";
pub const OPERATION_GRAPH_MAGIC: Magic = *b"BOG\0";
pub const OPERATION_RESULTS_MAGIC: Magic = *b"BOR\0";

/// The state file formats, told apart by their leading magic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateFileKind {
  ValueTable,
  FileSystemState,
  OperationGraph,
  OperationResults,
}

impl StateFileKind {
  pub fn detect(bytes: &[u8]) -> Option<Self> {
    let magic: Magic = bytes.get(..4)?.try_into().ok()?;
    match magic {
      VALUE_TABLE_MAGIC => Some(Self::ValueTable),
      FILE_SYSTEM_STATE_MAGIC => Some(Self::FileSystemState),
      OPERATION_GRAPH_MAGIC => Some(Self::OperationGraph),
      OPERATION_RESULTS_MAGIC => Some(Self::OperationResults),
      _ => None,
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::ValueTable => "value table",
      Self::FileSystemState => "file system state",
      Self::OperationGraph => "operation graph",
      Self::OperationResults => "operation results",
    }
  }
}

/// Errors produced while encoding or decoding a binary state file.
#[derive(Debug, Error)]
pub enum CodecError {
  #[error("io error: {0}")]
  Io(#[from] io::Error),

  #[error("invalid magic: expected {expected:?}, found {found:?}")]
  MagicMismatch { expected: String, found: String },

  #[error("unsupported format version {found}, expected {expected}")]
  UnsupportedVersion { expected: u32, found: u32 },

  #[error("unexpected end of data while reading {context}")]
  Truncated { context: &'static str },

  #[error("file corrupted - did not read entire file")]
  TrailingBytes,

  #[error("invalid utf-8 while reading {context}")]
  InvalidUtf8 { context: &'static str },

  #[error("unknown value type tag {0}")]
  UnknownTypeTag(u32),

  #[error("invalid boolean value {0}")]
  InvalidBoolean(u32),

  #[error("value nesting exceeds {0} levels")]
  NestingTooDeep(usize),

  #[error("file id {0} is not present in the file table")]
  UnknownFileId(u32),

  #[error("duplicate file id {0} in the file table")]
  DuplicateFileId(u32),

  #[error("path is not valid utf-8: {0}")]
  NonUtf8Path(PathBuf),

  #[error("length {0} does not fit in a u32")]
  LengthOverflow(usize),
}

fn magic_display(magic: &[u8]) -> String {
  String::from_utf8_lossy(magic).trim_end_matches('\0').to_string()
}

/// Append-only little-endian writer.
#[derive(Debug, Default)]
pub struct BinaryWriter {
  buf: Vec<u8>,
}

impl BinaryWriter {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn write_magic(&mut self, magic: &Magic) {
    self.buf.extend_from_slice(magic);
  }

  pub fn write_u32(&mut self, value: u32) {
    self.buf.extend_from_slice(&value.to_le_bytes());
  }

  pub fn write_u64(&mut self, value: u64) {
    self.buf.extend_from_slice(&value.to_le_bytes());
  }

  pub fn write_i64(&mut self, value: i64) {
    self.buf.extend_from_slice(&value.to_le_bytes());
  }

  pub fn write_f64(&mut self, value: f64) {
    self.buf.extend_from_slice(&value.to_le_bytes());
  }

  pub fn write_bool(&mut self, value: bool) {
    self.write_u32(u32::from(value));
  }

  /// Write a collection length as a `u32` count.
  pub fn write_len(&mut self, len: usize) -> Result<(), CodecError> {
    let len = u32::try_from(len).map_err(|_| CodecError::LengthOverflow(len))?;
    self.write_u32(len);
    Ok(())
  }

  /// Write a length-prefixed string without terminator.
  pub fn write_str(&mut self, value: &str) -> Result<(), CodecError> {
    self.write_len(value.len())?;
    self.buf.extend_from_slice(value.as_bytes());
    Ok(())
  }

  pub fn write_path(&mut self, path: &Path) -> Result<(), CodecError> {
    let value = path.to_str().ok_or_else(|| CodecError::NonUtf8Path(path.to_path_buf()))?;
    self.write_str(value)
  }

  pub fn into_bytes(self) -> Vec<u8> {
    self.buf
  }
}

/// Cursor over an in-memory state file.
#[derive(Debug)]
pub struct BinaryReader<'a> {
  bytes: &'a [u8],
  offset: usize,
}

impl<'a> BinaryReader<'a> {
  pub fn new(bytes: &'a [u8]) -> Self {
    Self { bytes, offset: 0 }
  }

  fn take(&mut self, len: usize, context: &'static str) -> Result<&'a [u8], CodecError> {
    let end = self
      .offset
      .checked_add(len)
      .filter(|end| *end <= self.bytes.len())
      .ok_or(CodecError::Truncated { context })?;
    let slice = &self.bytes[self.offset..end];
    self.offset = end;
    Ok(slice)
  }

  fn take_array<const N: usize>(&mut self, context: &'static str) -> Result<[u8; N], CodecError> {
    let mut out = [0u8; N];
    out.copy_from_slice(self.take(N, context)?);
    Ok(out)
  }

  /// Consume a section marker and fail if it does not match.
  pub fn expect_magic(&mut self, expected: &Magic) -> Result<(), CodecError> {
    let found = self.take(expected.len(), "magic")?;
    if found != expected {
      return Err(CodecError::MagicMismatch {
        expected: magic_display(expected),
        found: magic_display(found),
      });
    }
    Ok(())
  }

  /// Consume a format version and fail if it does not match.
  pub fn expect_version(&mut self, expected: u32) -> Result<(), CodecError> {
    let found = self.read_u32("format version")?;
    if found != expected {
      return Err(CodecError::UnsupportedVersion { expected, found });
    }
    Ok(())
  }

  pub fn read_u32(&mut self, context: &'static str) -> Result<u32, CodecError> {
    Ok(u32::from_le_bytes(self.take_array(context)?))
  }

  pub fn read_u64(&mut self, context: &'static str) -> Result<u64, CodecError> {
    Ok(u64::from_le_bytes(self.take_array(context)?))
  }

  pub fn read_i64(&mut self, context: &'static str) -> Result<i64, CodecError> {
    Ok(i64::from_le_bytes(self.take_array(context)?))
  }

  pub fn read_f64(&mut self, context: &'static str) -> Result<f64, CodecError> {
    Ok(f64::from_le_bytes(self.take_array(context)?))
  }

  pub fn read_bool(&mut self, context: &'static str) -> Result<bool, CodecError> {
    match self.read_u32(context)? {
      0 => Ok(false),
      1 => Ok(true),
      other => Err(CodecError::InvalidBoolean(other)),
    }
  }

  pub fn read_string(&mut self, context: &'static str) -> Result<String, CodecError> {
    let len = self.read_u32(context)? as usize;
    let bytes = self.take(len, context)?;
    String::from_utf8(bytes.to_vec()).map_err(|_| CodecError::InvalidUtf8 { context })
  }

  pub fn read_path(&mut self, context: &'static str) -> Result<PathBuf, CodecError> {
    self.read_string(context).map(PathBuf::from)
  }

  /// Fail if any bytes remain after the declared structure.
  pub fn finish(self) -> Result<(), CodecError> {
    if self.offset != self.bytes.len() {
      return Err(CodecError::TrailingBytes);
    }
    Ok(())
  }
}

/// Read a whole file, mapping a missing file to `None`.
pub fn read_file_optional(path: &Path) -> Result<Option<Vec<u8>>, CodecError> {
  match fs::read(path) {
    Ok(bytes) => Ok(Some(bytes)),
    Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
    Err(e) => Err(CodecError::Io(e)),
  }
}

/// Write a file atomically: the bytes land in a sibling temp file which is
/// then renamed over `path`.
pub fn write_file_atomic(path: &Path, bytes: &[u8]) -> Result<(), CodecError> {
  let parent = match path.parent() {
    Some(parent) if !parent.as_os_str().is_empty() => parent,
    _ => Path::new("."),
  };
  fs::create_dir_all(parent)?;

  let mut temp = NamedTempFile::new_in(parent)?;
  temp.write_all(bytes)?;
  temp.as_file().sync_all()?;
  temp.persist(path).map_err(|e| CodecError::Io(e.error))?;
  Ok(())
}
