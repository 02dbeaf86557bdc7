//! The ingestion pipeline: batch → normalize → reconcile → dedup → write.
//!
//! File-level problems (bad names, unreadable CSV, unavailable sources) are
//! absorbed into the [`IngestReport`]. Only store errors escalate.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{
  dedup::dedup,
  normalize::normalize,
  record::NormalizedRecord,
  retrieve::Retriever,
  schema::{SchemaProfile, SchemaReport, reconcile},
  source::{CSV_EXTENSION, RawFile, SourceCoordinate},
  store::{MatchStore, WriteMode},
  Error, Result,
};

// ─── Batch ───────────────────────────────────────────────────────────────────

/// A file that did not make it into the store, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedFile {
  pub file:   String,
  pub reason: String,
}

/// Raw files queued for one ingestion run, in processing order.
#[derive(Debug, Default)]
pub struct Batch {
  files:   Vec<RawFile>,
  skipped: Vec<SkippedFile>,
}

impl Batch {
  pub fn new() -> Self { Self::default() }

  pub fn push(&mut self, raw: RawFile) { self.files.push(raw); }

  /// Record a file that failed before it could be queued.
  pub fn skip(&mut self, file: impl Into<String>, err: &Error) {
    let file = file.into();
    warn!(%file, error = %err, "skipping file");
    self.skipped.push(SkippedFile { file, reason: err.to_string() });
  }

  /// Read each path, deriving coordinates from file names.
  pub fn from_paths(paths: impl IntoIterator<Item = PathBuf>) -> Self {
    let mut batch = Self::new();
    for path in paths {
      match RawFile::from_path(&path) {
        Ok(raw) => batch.push(raw),
        Err(e) => batch.skip(path.display().to_string(), &e),
      }
    }
    batch
  }

  /// Every `*.csv` directly inside `dir`, sorted by file name.
  pub fn from_dir(dir: &Path) -> Result<Self> {
    let io_err = |source| Error::Io { path: dir.to_path_buf(), source };

    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(io_err)? {
      let path = entry.map_err(io_err)?.path();
      let is_csv = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(CSV_EXTENSION));
      if path.is_file() && is_csv {
        paths.push(path);
      }
    }
    paths.sort();

    debug!(dir = %dir.display(), files = paths.len(), "discovered files");
    Ok(Self::from_paths(paths))
  }

  /// Ask `retriever` for each coordinate in turn. Unavailable coordinates are
  /// recorded as skipped.
  pub async fn fetch<R: Retriever>(
    retriever: &R,
    coordinates: impl IntoIterator<Item = SourceCoordinate>,
  ) -> Self {
    let mut batch = Self::new();
    for coordinate in coordinates {
      let label = coordinate.file_name(CSV_EXTENSION);
      match retriever.fetch(coordinate).await {
        Ok(raw) => batch.push(raw),
        Err(e) => batch.skip(label, &e),
      }
    }
    batch
  }

  pub fn len(&self) -> usize { self.files.len() }

  pub fn is_empty(&self) -> bool { self.files.is_empty() }

  pub fn skipped(&self) -> &[SkippedFile] { &self.skipped }
}

// ─── Report ──────────────────────────────────────────────────────────────────

/// What an ingestion run did.
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
  pub mode:                WriteMode,
  pub files_loaded:        usize,
  pub rows_read:           usize,
  pub rows_written:        usize,
  pub rows_already_stored: usize,
  pub unparseable_dates:   usize,
  pub columns_added:       Vec<String>,
  pub skipped:             Vec<SkippedFile>,
  pub schema:              SchemaReport,
}

impl IngestReport {
  fn new(mode: WriteMode, skipped: Vec<SkippedFile>) -> Self {
    Self {
      mode,
      files_loaded: 0,
      rows_read: 0,
      rows_written: 0,
      rows_already_stored: 0,
      unparseable_dates: 0,
      columns_added: Vec::new(),
      skipped,
      schema: SchemaReport::default(),
    }
  }

  fn skip(&mut self, file: &str, err: &Error) {
    warn!(file, error = %err, "skipping file");
    self.skipped.push(SkippedFile { file: file.to_owned(), reason: err.to_string() });
  }

  fn absorb_columns(&mut self, columns: Vec<String>) {
    for column in columns {
      if !self.columns_added.contains(&column) {
        self.columns_added.push(column);
      }
    }
  }
}

// ─── Loading ─────────────────────────────────────────────────────────────────

/// One file, fully normalized.
struct Loaded {
  profile:     SchemaProfile,
  records:     Vec<NormalizedRecord>,
  unparseable: usize,
}

/// Normalize a whole file. Any row-level CSV error rejects the file, so a
/// file is never partially written.
fn load(raw: &RawFile) -> Result<Loaded> {
  let records = normalize(raw)?;
  let profile = records.profile().clone();
  let records = records.collect::<Result<Vec<_>>>()?;
  let unparseable = records
    .iter()
    .filter(|r| r.date.as_ref().is_some_and(|d| !d.is_parsed()))
    .count();

  if unparseable > 0 {
    warn!(file = %raw.name, rows = unparseable, "dates that did not parse were stored as null");
  }
  Ok(Loaded { profile, records, unparseable })
}

fn log_divergence(schema: &SchemaReport) {
  if schema.has_divergence() {
    let columns: Vec<&str> = schema.divergent_columns().collect();
    warn!(
      common = schema.common_columns.len(),
      all = schema.all_columns.len(),
      divergent = ?columns,
      "column sets differ between files"
    );
  }
}

/// Profile every file in `batch` without touching a store.
pub fn inspect(batch: &Batch) -> (Vec<SchemaProfile>, Vec<SkippedFile>) {
  let mut skipped = batch.skipped.clone();
  let mut profiles = Vec::with_capacity(batch.files.len());
  for raw in &batch.files {
    match normalize(raw) {
      Ok(records) => profiles.push(records.profile().clone()),
      Err(e) => skipped.push(SkippedFile { file: raw.name.clone(), reason: e.to_string() }),
    }
  }
  (profiles, skipped)
}

// ─── Ingestor ────────────────────────────────────────────────────────────────

/// Drives a batch into a [`MatchStore`].
pub struct Ingestor<'s, S> {
  store: &'s S,
}

impl<'s, S: MatchStore> Ingestor<'s, S> {
  pub fn new(store: &'s S) -> Self { Self { store } }

  /// Replace the store with everything in `batch`.
  ///
  /// When no file in the batch loads, the store is left untouched.
  #[tracing::instrument(level = "info", skip_all, fields(files = batch.len()))]
  pub async fn rebuild(&self, batch: Batch) -> Result<IngestReport, S::Error> {
    let mut report = IngestReport::new(WriteMode::Full, batch.skipped);
    let mut profiles = Vec::with_capacity(batch.files.len());
    let mut corpus = Vec::new();

    for raw in &batch.files {
      match load(raw) {
        Ok(loaded) => {
          debug!(file = %raw.name, rows = loaded.records.len(), "loaded");
          report.files_loaded += 1;
          report.rows_read += loaded.records.len();
          report.unparseable_dates += loaded.unparseable;
          profiles.push(loaded.profile);
          corpus.extend(loaded.records);
        }
        Err(e) => report.skip(&raw.name, &e),
      }
    }

    report.schema = reconcile(&profiles);
    log_divergence(&report.schema);

    if report.files_loaded == 0 {
      warn!("nothing loaded; store left unchanged");
      return Ok(report);
    }

    let summary = self.store.write(corpus, WriteMode::Full).await?;
    report.rows_written = summary.rows_written;
    report.absorb_columns(summary.columns_added);

    info!(
      files = report.files_loaded,
      rows = report.rows_written,
      skipped = report.skipped.len(),
      "rebuild complete"
    );
    Ok(report)
  }

  /// Append only records whose natural key is not yet stored.
  ///
  /// Files are processed one at a time, each written before the next is
  /// diffed, so two files for the same pair in one batch cannot re-admit
  /// each other's rows.
  #[tracing::instrument(level = "info", skip_all, fields(files = batch.len()))]
  pub async fn update(&self, batch: Batch) -> Result<IngestReport, S::Error> {
    let mut report = IngestReport::new(WriteMode::Incremental, batch.skipped);
    let mut profiles = Vec::with_capacity(batch.files.len());

    for raw in &batch.files {
      let loaded = match load(raw) {
        Ok(loaded) => loaded,
        Err(e) => {
          report.skip(&raw.name, &e);
          continue;
        }
      };
      report.files_loaded += 1;
      report.rows_read += loaded.records.len();
      report.unparseable_dates += loaded.unparseable;
      profiles.push(loaded.profile);

      let existing = self.store.existing_keys(raw.coordinate.clone()).await?;
      let total = loaded.records.len();
      let diff = dedup(loaded.records, &existing);
      report.rows_already_stored += diff.already_stored;

      if diff.fresh.is_empty() {
        info!(file = %raw.name, total, "no new rows");
        continue;
      }

      let summary = self.store.write(diff.fresh, WriteMode::Incremental).await?;
      report.rows_written += summary.rows_written;
      report.absorb_columns(summary.columns_added);
      info!(file = %raw.name, added = summary.rows_written, total, "appended new rows");
    }

    report.schema = reconcile(&profiles);
    log_divergence(&report.schema);
    Ok(report)
  }
}

#[cfg(test)]
mod tests {
  use std::{collections::HashSet, convert::Infallible, sync::Mutex};

  use super::*;
  use crate::{
    dedup::{KeySet, NaturalKey},
    store::{Partition, WriteSummary},
  };

  /// Vec-backed store for exercising the pipeline without a database.
  #[derive(Default)]
  struct MemoryStore {
    rows: Mutex<Vec<NormalizedRecord>>,
  }

  impl MatchStore for MemoryStore {
    type Error = Infallible;

    async fn existing_keys(&self, coordinate: SourceCoordinate) -> Result<KeySet, Infallible> {
      let rows = self.rows.lock().unwrap();
      let keys: HashSet<NaturalKey> = rows
        .iter()
        .filter(|r| r.coordinate == coordinate)
        .map(NaturalKey::of)
        .collect();
      Ok(KeySet::new(coordinate, keys))
    }

    async fn write(
      &self,
      records: Vec<NormalizedRecord>,
      mode: WriteMode,
    ) -> Result<WriteSummary, Infallible> {
      let mut rows = self.rows.lock().unwrap();
      if mode == WriteMode::Full {
        rows.clear();
      }
      let rows_written = records.len();
      rows.extend(records);
      Ok(WriteSummary { rows_written, columns_added: vec![] })
    }

    async fn row_count(&self, coordinate: Option<SourceCoordinate>) -> Result<u64, Infallible> {
      let rows = self.rows.lock().unwrap();
      Ok(rows.iter().filter(|r| coordinate.as_ref().is_none_or(|c| &r.coordinate == c)).count()
        as u64)
    }

    async fn partitions(&self) -> Result<Vec<Partition>, Infallible> { Ok(vec![]) }
  }

  fn file(season: &str, league: &str, csv: &str) -> RawFile {
    RawFile::tagged(SourceCoordinate::new(season, league), csv.as_bytes().to_vec())
  }

  const E0_V1: &str = "Date,HomeTeam,AwayTeam,FTHG\n15/03/2024,Arsenal,Chelsea,2\n";
  const E0_V2: &str =
    "Date,HomeTeam,AwayTeam,FTHG\n15/03/2024,Arsenal,Chelsea,2\n16/03/2024,Fulham,Spurs,1\n";

  #[tokio::test]
  async fn update_appends_only_new_rows_and_is_idempotent() {
    let store = MemoryStore::default();
    let ingestor = Ingestor::new(&store);

    let mut first = Batch::new();
    first.push(file("2425", "E0", E0_V1));
    let report = ingestor.update(first).await.unwrap();
    assert_eq!(report.rows_written, 1);

    for _ in 0..2 {
      let mut batch = Batch::new();
      batch.push(file("2425", "E0", E0_V2));
      ingestor.update(batch).await.unwrap();
    }

    assert_eq!(store.row_count(None).await.unwrap(), 2);
  }

  #[tokio::test]
  async fn same_pair_twice_in_one_batch_is_not_readmitted() {
    let store = MemoryStore::default();
    let mut batch = Batch::new();
    batch.push(file("2425", "E0", E0_V2));
    batch.push(file("2425", "E0", E0_V2));

    let report = Ingestor::new(&store).update(batch).await.unwrap();
    assert_eq!(report.rows_written, 2);
    assert_eq!(report.rows_already_stored, 2);
  }

  #[tokio::test]
  async fn bad_file_is_skipped_and_batch_continues() {
    let store = MemoryStore::default();
    let mut batch = Batch::new();
    batch.push(file("2425", "E0", ""));
    batch.push(file("2425", "E1", E0_V1));
    batch.skip("junk.csv", &Error::MalformedFilename("junk.csv".into()));

    let report = Ingestor::new(&store).rebuild(batch).await.unwrap();
    assert_eq!(report.files_loaded, 1);
    assert_eq!(report.rows_written, 1);
    let skipped: Vec<_> = report.skipped.iter().map(|s| s.file.as_str()).collect();
    assert_eq!(skipped, ["junk.csv", "2425_E0.csv"]);
  }

  #[tokio::test]
  async fn rebuild_with_nothing_loaded_leaves_store_alone() {
    let store = MemoryStore::default();
    let mut seed = Batch::new();
    seed.push(file("2425", "E0", E0_V2));
    Ingestor::new(&store).rebuild(seed).await.unwrap();

    let report = Ingestor::new(&store).rebuild(Batch::new()).await.unwrap();
    assert_eq!(report.rows_written, 0);
    assert_eq!(store.row_count(None).await.unwrap(), 2);
  }

  #[tokio::test]
  async fn report_surfaces_schema_drift() {
    let store = MemoryStore::default();
    let mut batch = Batch::new();
    batch.push(file("2425", "E0", "Date,HomeTeam,AwayTeam,Referee\n15/03/2024,A,B,X\n"));
    batch.push(file("2425", "SP1", "Date,HomeTeam,AwayTeam\n15/03/2024,C,D\n"));

    let report = Ingestor::new(&store).rebuild(batch).await.unwrap();
    assert_eq!(report.rows_written, 2);
    assert!(report.schema.has_divergence());
    assert_eq!(report.schema.missing_from["Referee"], ["2425_SP1.csv"]);
  }

  #[test]
  fn from_dir_sorts_and_skips_malformed_names() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("2425_E1.csv"), E0_V1).unwrap();
    std::fs::write(dir.path().join("2324_E0.csv"), E0_V1).unwrap();
    std::fs::write(dir.path().join("latest.csv"), E0_V1).unwrap();
    std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

    let batch = Batch::from_dir(dir.path()).unwrap();
    let names: Vec<_> = batch.files.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, ["2324_E0.csv", "2425_E1.csv"]);
    assert_eq!(batch.skipped().len(), 1);
    assert!(batch.skipped()[0].file.ends_with("latest.csv"));
  }

  #[test]
  fn inspect_profiles_without_store() {
    let mut batch = Batch::new();
    batch.push(file("2425", "E0", "Date,HomeTeam\n"));
    batch.push(file("2425", "E1", ""));

    let (profiles, skipped) = inspect(&batch);
    assert_eq!(profiles.len(), 1);
    assert_eq!(profiles[0].columns(), ["Date", "HomeTeam"]);
    assert_eq!(skipped.len(), 1);
  }
}
