//! The `MatchStore` trait and supporting types.
//!
//! Implemented by storage backends (e.g. `footy-store-sqlite`). The pipeline in
//! [`crate::ingest`] depends on this abstraction, not on any concrete backend.

use std::future::Future;

use serde::Serialize;

use crate::{dedup::KeySet, record::NormalizedRecord, source::SourceCoordinate};

/// How [`MatchStore::write`] treats existing contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteMode {
  /// Replace everything with the given corpus and rebuild indexes.
  Full,
  /// Append the given (already deduplicated) records.
  Incremental,
}

/// What a single write did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WriteSummary {
  pub rows_written:  usize,
  /// Columns the stored table gained to fit this write.
  pub columns_added: Vec<String>,
}

/// Row count for one `(Season, League)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Partition {
  pub coordinate: SourceCoordinate,
  pub rows:       u64,
}

/// Abstraction over a durable match store.
///
/// Implementations must hold exclusive write access for the duration of each
/// `write` and must commit it all-or-nothing. Data is queryable as soon as
/// `write` returns.
pub trait MatchStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Keys already stored for exactly `coordinate`. Empty (not an error) when
  /// nothing has been stored yet.
  fn existing_keys(
    &self,
    coordinate: SourceCoordinate,
  ) -> impl Future<Output = Result<KeySet, Self::Error>> + Send + '_;

  /// Persist `records` according to `mode`.
  fn write(
    &self,
    records: Vec<NormalizedRecord>,
    mode: WriteMode,
  ) -> impl Future<Output = Result<WriteSummary, Self::Error>> + Send + '_;

  /// Number of stored rows, optionally restricted to one pair.
  fn row_count(
    &self,
    coordinate: Option<SourceCoordinate>,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  /// Row counts for every stored pair, ordered by season then league.
  fn partitions(&self) -> impl Future<Output = Result<Vec<Partition>, Self::Error>> + Send + '_;
}
