//! Conversions between core values and SQLite values.

use footy_core::record::{NormalizedRecord, Value};
use rusqlite::types::{Value as SqlValue, ValueRef};

/// Quote an identifier for use in SQL text.
pub fn quote(ident: &str) -> String { format!("\"{}\"", ident.replace('"', "\"\"")) }

pub fn encode_value(value: Value) -> SqlValue {
  match value {
    Value::Null => SqlValue::Null,
    Value::Number(n) => SqlValue::Real(n),
    Value::Text(s) => SqlValue::Text(s),
  }
}

/// A record flattened into owned `(column, value)` pairs that can cross into
/// the database thread.
pub type EncodedRow = Vec<(String, SqlValue)>;

pub fn encode_record(record: &NormalizedRecord) -> EncodedRow {
  record
    .columns()
    .into_iter()
    .map(|(name, value)| (name.to_owned(), encode_value(value)))
    .collect()
}

/// Text form of a stored cell, matching [`Value::key_text`] for round-tripped
/// values.
pub fn key_text(value: ValueRef<'_>) -> String {
  match value {
    ValueRef::Null => String::new(),
    ValueRef::Integer(i) => i.to_string(),
    ValueRef::Real(f) => f.to_string(),
    ValueRef::Text(t) | ValueRef::Blob(t) => String::from_utf8_lossy(t).into_owned(),
  }
}
