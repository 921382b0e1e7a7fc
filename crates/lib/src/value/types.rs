use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

/// Ordered map from name to value. Iteration is always sorted by key.
pub type ValueTable = BTreeMap<String, Value>;

pub type ValueList = Vec<Value>;

/// A recursive, dynamically typed value.
///
/// Values form a tree: tables and lists own their children, so cycles are
/// unrepresentable.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
  Table(ValueTable),
  List(ValueList),
  String(String),
  Integer(i64),
  Float(f64),
  Boolean(bool),
}

/// Discriminant of a [`Value`], with the BVT type tag as its representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ValueType {
  Table = 1,
  List = 2,
  String = 3,
  Integer = 4,
  Float = 5,
  Boolean = 6,
}

impl ValueType {
  pub fn from_tag(tag: u32) -> Option<Self> {
    match tag {
      1 => Some(Self::Table),
      2 => Some(Self::List),
      3 => Some(Self::String),
      4 => Some(Self::Integer),
      5 => Some(Self::Float),
      6 => Some(Self::Boolean),
      _ => None,
    }
  }

  pub fn tag(self) -> u32 {
    self as u32
  }
}

impl fmt::Display for ValueType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      Self::Table => "table",
      Self::List => "list",
      Self::String => "string",
      Self::Integer => "integer",
      Self::Float => "float",
      Self::Boolean => "boolean",
    };
    f.write_str(name)
  }
}

impl Value {
  pub fn value_type(&self) -> ValueType {
    match self {
      Self::Table(_) => ValueType::Table,
      Self::List(_) => ValueType::List,
      Self::String(_) => ValueType::String,
      Self::Integer(_) => ValueType::Integer,
      Self::Float(_) => ValueType::Float,
      Self::Boolean(_) => ValueType::Boolean,
    }
  }

  pub fn as_table(&self) -> Option<&ValueTable> {
    match self {
      Self::Table(table) => Some(table),
      _ => None,
    }
  }

  pub fn as_list(&self) -> Option<&ValueList> {
    match self {
      Self::List(list) => Some(list),
      _ => None,
    }
  }

  pub fn as_str(&self) -> Option<&str> {
    match self {
      Self::String(value) => Some(value),
      _ => None,
    }
  }

  pub fn as_integer(&self) -> Option<i64> {
    match self {
      Self::Integer(value) => Some(*value),
      _ => None,
    }
  }

  pub fn as_float(&self) -> Option<f64> {
    match self {
      Self::Float(value) => Some(*value),
      _ => None,
    }
  }

  pub fn as_bool(&self) -> Option<bool> {
    match self {
      Self::Boolean(value) => Some(*value),
      _ => None,
    }
  }

  /// Build a list of strings, e.g. for path lists in generator input.
  pub fn string_list<I, S>(items: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self::List(items.into_iter().map(|s| Self::String(s.into())).collect())
  }
}

impl From<ValueTable> for Value {
  fn from(value: ValueTable) -> Self {
    Self::Table(value)
  }
}

impl From<ValueList> for Value {
  fn from(value: ValueList) -> Self {
    Self::List(value)
  }
}

impl From<String> for Value {
  fn from(value: String) -> Self {
    Self::String(value)
  }
}

impl From<&str> for Value {
  fn from(value: &str) -> Self {
    Self::String(value.to_string())
  }
}

impl From<i64> for Value {
  fn from(value: i64) -> Self {
    Self::Integer(value)
  }
}

impl From<f64> for Value {
  fn from(value: f64) -> Self {
    Self::Float(value)
  }
}

impl From<bool> for Value {
  fn from(value: bool) -> Self {
    Self::Boolean(value)
  }
}

/// Recipe documents are TOML; datetimes have no value counterpart and are
/// kept in their textual form.
impl From<toml::Value> for Value {
  fn from(value: toml::Value) -> Self {
    match value {
      toml::Value::String(s) => Self::String(s),
      toml::Value::Integer(i) => Self::Integer(i),
      toml::Value::Float(f) => Self::Float(f),
      toml::Value::Boolean(b) => Self::Boolean(b),
      toml::Value::Datetime(d) => Self::String(d.to_string()),
      toml::Value::Array(items) => Self::List(items.into_iter().map(Self::from).collect()),
      toml::Value::Table(table) => Self::Table(table_from_toml(table)),
    }
  }
}

pub(crate) fn table_from_toml(table: toml::Table) -> ValueTable {
  table.into_iter().map(|(k, v)| (k, Value::from(v))).collect()
}
