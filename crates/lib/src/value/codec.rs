//! BVT: the binary value-table format.
//!
//! ```text
//! "BVT\0" u32(version=2) "TBL\0" <table>
//! <table> = u32(count) { u32(keyLen) key u32(tag) <payload> }×count
//! <list>  = u32(count) { u32(tag) <payload> }×count
//! ```
//!
//! Tables are written in key order, so equal tables encode to equal bytes.

use std::path::Path;

use tracing::debug;

use super::types::{Value, ValueTable, ValueType};
use crate::codec::{BinaryReader, BinaryWriter, CodecError, Magic, VALUE_TABLE_MAGIC as FILE_MAGIC, write_file_atomic};

const TABLE_MAGIC: Magic = *b"TBL\0";
const FILE_VERSION: u32 = 2;

/// Values nested deeper than this are rejected when decoding.
pub const MAX_DEPTH: usize = 128;

pub fn encode_value_table(table: &ValueTable) -> Result<Vec<u8>, CodecError> {
  let mut writer = BinaryWriter::new();
  writer.write_magic(&FILE_MAGIC);
  writer.write_u32(FILE_VERSION);
  writer.write_magic(&TABLE_MAGIC);
  write_table(&mut writer, table)?;
  Ok(writer.into_bytes())
}

pub fn decode_value_table(bytes: &[u8]) -> Result<ValueTable, CodecError> {
  let mut reader = BinaryReader::new(bytes);
  reader.expect_magic(&FILE_MAGIC)?;
  reader.expect_version(FILE_VERSION)?;
  reader.expect_magic(&TABLE_MAGIC)?;
  let table = read_table(&mut reader, 0)?;
  reader.finish()?;
  Ok(table)
}

pub fn write_value_table(path: &Path, table: &ValueTable) -> Result<(), CodecError> {
  debug!(path = %path.display(), entries = table.len(), "writing value table");
  let bytes = encode_value_table(table)?;
  write_file_atomic(path, &bytes)
}

pub fn read_value_table(path: &Path) -> Result<ValueTable, CodecError> {
  let bytes = std::fs::read(path)?;
  decode_value_table(&bytes)
}

fn write_table(writer: &mut BinaryWriter, table: &ValueTable) -> Result<(), CodecError> {
  writer.write_len(table.len())?;
  for (key, value) in table {
    writer.write_str(key)?;
    write_value(writer, value)?;
  }
  Ok(())
}

fn write_value(writer: &mut BinaryWriter, value: &Value) -> Result<(), CodecError> {
  writer.write_u32(value.value_type().tag());
  match value {
    Value::Table(table) => write_table(writer, table)?,
    Value::List(list) => {
      writer.write_len(list.len())?;
      for item in list {
        write_value(writer, item)?;
      }
    }
    Value::String(s) => writer.write_str(s)?,
    Value::Integer(i) => writer.write_i64(*i),
    Value::Float(f) => writer.write_f64(*f),
    Value::Boolean(b) => writer.write_bool(*b),
  }
  Ok(())
}

fn read_table(reader: &mut BinaryReader<'_>, depth: usize) -> Result<ValueTable, CodecError> {
  if depth > MAX_DEPTH {
    return Err(CodecError::NestingTooDeep(MAX_DEPTH));
  }

  let count = reader.read_u32("table entry count")?;
  let mut table = ValueTable::new();
  for _ in 0..count {
    let key = reader.read_string("table key")?;
    let value = read_value(reader, depth)?;
    table.insert(key, value);
  }
  Ok(table)
}

fn read_value(reader: &mut BinaryReader<'_>, depth: usize) -> Result<Value, CodecError> {
  let tag = reader.read_u32("value type")?;
  let value_type = ValueType::from_tag(tag).ok_or(CodecError::UnknownTypeTag(tag))?;
  let value = match value_type {
    ValueType::Table => Value::Table(read_table(reader, depth + 1)?),
    ValueType::List => {
      if depth + 1 > MAX_DEPTH {
        return Err(CodecError::NestingTooDeep(MAX_DEPTH));
      }
      let count = reader.read_u32("list entry count")?;
      let mut list = Vec::new();
      for _ in 0..count {
        list.push(read_value(reader, depth + 1)?);
      }
      Value::List(list)
    }
    ValueType::String => Value::String(reader.read_string("string value")?),
    ValueType::Integer => Value::Integer(reader.read_i64("integer value")?),
    ValueType::Float => Value::Float(reader.read_f64("float value")?),
    ValueType::Boolean => Value::Boolean(reader.read_bool("boolean value")?),
  };
  Ok(value)
}
