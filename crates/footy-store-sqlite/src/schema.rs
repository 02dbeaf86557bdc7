//! Table layout for the SQLite store.
//!
//! The `matches` table has no fixed schema: it is created with the union of
//! every column seen, and widened with `ALTER TABLE` when an incremental write
//! brings new ones. The key and provenance columns always exist so indexes and
//! key lookups never depend on what a particular file contained.

use std::collections::HashMap;

use footy_core::record::{AWAY_TEAM, DATE, HOME_TEAM, LEAGUE, SEASON, SOURCE_FILE};

use crate::encode::quote;

pub const TABLE: &str = "matches";

/// Run on every connection.
pub const PRAGMAS: &str = "
PRAGMA journal_mode = WAL;
PRAGMA synchronous  = NORMAL;
";

/// Columns created up front, typed `TEXT`. Everything else is left untyped so
/// values keep their source representation.
pub const BASE_COLUMNS: [&str; 6] = [DATE, HOME_TEAM, AWAY_TEAM, SEASON, LEAGUE, SOURCE_FILE];

/// Secondary indexes; idempotent thanks to `IF NOT EXISTS`.
pub const INDEXES: &str = "
CREATE INDEX IF NOT EXISTS idx_date   ON matches(Date);
CREATE INDEX IF NOT EXISTS idx_league ON matches(League);
CREATE INDEX IF NOT EXISTS idx_season ON matches(Season);
CREATE INDEX IF NOT EXISTS idx_teams  ON matches(HomeTeam, AwayTeam);
";

// ─── Column set ──────────────────────────────────────────────────────────────

/// Ordered column names with SQLite's ASCII case-insensitive identity.
#[derive(Debug, Clone, Default)]
pub struct ColumnSet {
  names: Vec<String>,
  index: HashMap<String, usize>,
}

impl ColumnSet {
  pub fn with_base() -> Self {
    let mut set = Self::default();
    for name in BASE_COLUMNS {
      set.insert(name);
    }
    set
  }

  /// Returns `true` if `name` was not already present (ignoring ASCII case).
  pub fn insert(&mut self, name: &str) -> bool {
    let folded = name.to_ascii_lowercase();
    if self.index.contains_key(&folded) {
      return false;
    }
    self.index.insert(folded, self.names.len());
    self.names.push(name.to_owned());
    true
  }

  pub fn position(&self, name: &str) -> Option<usize> {
    self.index.get(&name.to_ascii_lowercase()).copied()
  }

  pub fn names(&self) -> &[String] { &self.names }

  pub fn len(&self) -> usize { self.names.len() }

  pub fn is_empty(&self) -> bool { self.names.is_empty() }
}

// ─── DDL builders ────────────────────────────────────────────────────────────

fn column_def(name: &str) -> String {
  if BASE_COLUMNS.contains(&name) {
    format!("{} TEXT", quote(name))
  } else {
    quote(name)
  }
}

pub fn create_table(columns: &ColumnSet) -> String {
  let defs: Vec<String> = columns.names().iter().map(|c| column_def(c)).collect();
  format!("CREATE TABLE {TABLE} ({})", defs.join(", "))
}

pub fn add_column(name: &str) -> String {
  format!("ALTER TABLE {TABLE} ADD COLUMN {}", column_def(name))
}

pub fn insert_row(columns: &ColumnSet) -> String {
  let names: Vec<String> = columns.names().iter().map(|c| quote(c)).collect();
  let slots: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();
  format!("INSERT INTO {TABLE} ({}) VALUES ({})", names.join(", "), slots.join(", "))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn column_set_folds_ascii_case() {
    let mut set = ColumnSet::with_base();
    assert!(!set.insert("date"));
    assert!(set.insert("Referee"));
    assert!(!set.insert("REFEREE"));
    assert_eq!(set.position("referee"), Some(6));
    assert_eq!(set.names().last().map(String::as_str), Some("Referee"));
  }

  #[test]
  fn ddl_quotes_keywords() {
    let mut set = ColumnSet::with_base();
    set.insert("AS");
    let sql = create_table(&set);
    assert!(sql.starts_with("CREATE TABLE matches (\"Date\" TEXT, "));
    assert!(sql.ends_with("\"SourceFile\" TEXT, \"AS\")"));
    assert_eq!(add_column("BbMx>2.5"), "ALTER TABLE matches ADD COLUMN \"BbMx>2.5\"");
  }

  #[test]
  fn insert_has_one_slot_per_column() {
    let sql = insert_row(&ColumnSet::with_base());
    assert!(sql.ends_with("VALUES (?1, ?2, ?3, ?4, ?5, ?6)"));
  }
}
