//! Schema reconciliation across a batch of files.
//!
//! Purely diagnostic: the report says which columns drift between files, it
//! never drops or renames anything.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

/// Column names observed in one file's header, in header order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaProfile {
  pub source_file: String,
  columns:         Vec<String>,
}

impl SchemaProfile {
  pub fn new(source_file: impl Into<String>, columns: Vec<String>) -> Self {
    Self { source_file: source_file.into(), columns }
  }

  pub fn columns(&self) -> &[String] { &self.columns }

  pub fn column_set(&self) -> BTreeSet<&str> {
    self.columns.iter().map(String::as_str).collect()
  }
}

/// Union and intersection of column sets over a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SchemaReport {
  pub files:          usize,
  pub common_columns: BTreeSet<String>,
  pub all_columns:    BTreeSet<String>,
  /// For every column not present in all files, the files that lack it.
  pub missing_from:   BTreeMap<String, Vec<String>>,
}

impl SchemaReport {
  /// True when some column is absent from at least one file.
  pub fn has_divergence(&self) -> bool { self.common_columns.len() != self.all_columns.len() }

  /// Columns present in some files but not others.
  pub fn divergent_columns(&self) -> impl Iterator<Item = &str> {
    self.all_columns.difference(&self.common_columns).map(String::as_str)
  }
}

/// Compute the common and full column sets for `profiles`.
///
/// An empty batch yields an empty report.
pub fn reconcile<'a>(profiles: impl IntoIterator<Item = &'a SchemaProfile>) -> SchemaReport {
  let profiles: Vec<&SchemaProfile> = profiles.into_iter().collect();
  let Some((first, rest)) = profiles.split_first() else {
    return SchemaReport::default();
  };

  let mut common: BTreeSet<&str> = first.column_set();
  let mut all: BTreeSet<&str> = common.clone();
  for profile in rest {
    let set = profile.column_set();
    common.retain(|c| set.contains(c));
    all.extend(set);
  }

  let mut missing_from: BTreeMap<String, Vec<String>> = BTreeMap::new();
  for column in all.difference(&common) {
    let lacking = profiles
      .iter()
      .filter(|p| !p.columns.iter().any(|c| c == column))
      .map(|p| p.source_file.clone())
      .collect();
    missing_from.insert((*column).to_owned(), lacking);
  }

  SchemaReport {
    files: profiles.len(),
    common_columns: common.into_iter().map(str::to_owned).collect(),
    all_columns: all.into_iter().map(str::to_owned).collect(),
    missing_from,
  }
}
