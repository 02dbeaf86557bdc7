//! Normalized records, one per data row of a source file.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::{date::MatchDate, source::SourceCoordinate};

pub const DATE: &str = "Date";
pub const HOME_TEAM: &str = "HomeTeam";
pub const AWAY_TEAM: &str = "AwayTeam";
pub const SEASON: &str = "Season";
pub const LEAGUE: &str = "League";
pub const SOURCE_FILE: &str = "SourceFile";

/// Columns the normalizer always sets itself, replacing source data.
pub const PROVENANCE_COLUMNS: [&str; 3] = [SEASON, LEAGUE, SOURCE_FILE];

// ─── Value ───────────────────────────────────────────────────────────────────

/// A single cell.
///
/// Normalization never coerces, so freshly read cells are always `Text` or
/// `Null`. `Number` appears when reading back rows another tool stored with a
/// numeric type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
  Null,
  Number(f64),
  Text(String),
}

impl Value {
  /// Empty cells become `Null`.
  pub fn from_cell(cell: &str) -> Self {
    if cell.is_empty() { Self::Null } else { Self::Text(cell.to_owned()) }
  }

  pub fn is_null(&self) -> bool { matches!(self, Self::Null) }

  pub fn as_text(&self) -> Option<&str> {
    match self {
      Self::Text(s) => Some(s),
      _ => None,
    }
  }

  /// Text form used in natural keys; `Null` is the empty string.
  pub fn key_text(&self) -> Cow<'_, str> {
    match self {
      Self::Null => Cow::Borrowed(""),
      Self::Number(n) => Cow::Owned(n.to_string()),
      Self::Text(s) => Cow::Borrowed(s),
    }
  }
}

// ─── Record ──────────────────────────────────────────────────────────────────

/// One data row after normalization.
///
/// `Date` is held separately so callers must deal with the possibility that it
/// did not parse. All other source columns stay in header order in `fields`.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRecord {
  pub coordinate:  SourceCoordinate,
  pub source_file: String,
  /// `None` when the file has no `Date` column or the cell is empty.
  pub date:        Option<MatchDate>,
  /// Every other source column, excluding `Date` and the provenance columns.
  pub fields:      Vec<(String, Value)>,
}

impl NormalizedRecord {
  /// Look up a column by its (trimmed) name, ignoring ASCII case for source
  /// columns. Provenance columns included.
  pub fn get(&self, column: &str) -> Option<Value> {
    match column {
      DATE => self.date.as_ref().map(date_value),
      SEASON => Some(Value::Text(self.coordinate.season.clone())),
      LEAGUE => Some(Value::Text(self.coordinate.league.clone())),
      SOURCE_FILE => Some(Value::Text(self.source_file.clone())),
      _ => self
        .fields
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(column))
        .map(|(_, v)| v.clone()),
    }
  }

  /// All columns as they should be persisted: `Date` first (when the source
  /// had one), then source columns in header order, then provenance.
  pub fn columns(&self) -> Vec<(&str, Value)> {
    let mut out = Vec::with_capacity(self.fields.len() + 4);
    if let Some(date) = &self.date {
      out.push((DATE, date_value(date)));
    }
    out.extend(self.fields.iter().map(|(n, v)| (n.as_str(), v.clone())));
    out.push((SEASON, Value::Text(self.coordinate.season.clone())));
    out.push((LEAGUE, Value::Text(self.coordinate.league.clone())));
    out.push((SOURCE_FILE, Value::Text(self.source_file.clone())));
    out
  }

  pub(crate) fn field(&self, column: &str) -> Option<&Value> {
    self.fields.iter().find(|(name, _)| name.eq_ignore_ascii_case(column)).map(|(_, v)| v)
  }
}

/// Unparseable dates persist as `Null`.
fn date_value(date: &MatchDate) -> Value {
  date.to_iso().map(Value::Text).unwrap_or(Value::Null)
}
