//! BFS registry file and the `FIS` file table embedded in other state files.
//!
//! ```text
//! "BFS\0" u32(version=1) u32(registryId) u32(maxFileId) <file table>
//! <file table> = "FIS\0" u32(count) { u32(id) u32(len) path }×count
//! ```

use std::collections::BTreeMap;
use std::path::PathBuf;

use super::{FileId, FileSystemState};
use crate::codec::{BinaryReader, BinaryWriter, CodecError, FILE_SYSTEM_STATE_MAGIC as FILE_MAGIC, Magic};

const FILE_TABLE_MAGIC: Magic = *b"FIS\0";
const FILE_VERSION: u32 = 1;

pub fn encode_file_system_state(state: &FileSystemState) -> Result<Vec<u8>, CodecError> {
  let mut writer = BinaryWriter::new();
  writer.write_magic(&FILE_MAGIC);
  writer.write_u32(FILE_VERSION);
  writer.write_u32(state.id);
  writer.write_u32(state.max_file_id);
  let entries: Vec<(FileId, PathBuf)> =
    state.files.iter().map(|(id, path)| (*id, path.clone())).collect();
  write_file_table(&mut writer, &entries)?;
  Ok(writer.into_bytes())
}

pub fn decode_file_system_state(bytes: &[u8]) -> Result<FileSystemState, CodecError> {
  let mut reader = BinaryReader::new(bytes);
  reader.expect_magic(&FILE_MAGIC)?;
  reader.expect_version(FILE_VERSION)?;
  let id = reader.read_u32("registry id")?;
  let max_file_id = reader.read_u32("max file id")?;
  let files: BTreeMap<FileId, PathBuf> = read_file_table(&mut reader)?
    .into_iter()
    .map(|(id, path)| (FileId(id), path))
    .collect();
  reader.finish()?;

  // Ids above the high-water mark would be handed out again.
  let max_file_id = files.keys().map(|id| id.0).fold(max_file_id, u32::max);

  Ok(FileSystemState { id, max_file_id, files })
}

/// Write a `FIS` table of `(id, path)` pairs.
pub fn write_file_table(writer: &mut BinaryWriter, entries: &[(FileId, PathBuf)]) -> Result<(), CodecError> {
  writer.write_magic(&FILE_TABLE_MAGIC);
  writer.write_len(entries.len())?;
  for (id, path) in entries {
    writer.write_u32(id.0);
    writer.write_path(path)?;
  }
  Ok(())
}

/// Read a `FIS` table. Ids are returned raw: they belong to the file being
/// read and must be remapped before use.
pub fn read_file_table(reader: &mut BinaryReader<'_>) -> Result<Vec<(u32, PathBuf)>, CodecError> {
  reader.expect_magic(&FILE_TABLE_MAGIC)?;
  let count = reader.read_u32("file count")?;
  let mut seen = std::collections::HashSet::new();
  let mut entries = Vec::new();
  for _ in 0..count {
    let id = reader.read_u32("file id")?;
    let path = reader.read_path("file path")?;
    if !seen.insert(id) {
      return Err(CodecError::DuplicateFileId(id));
    }
    entries.push((id, path));
  }
  Ok(entries)
}
