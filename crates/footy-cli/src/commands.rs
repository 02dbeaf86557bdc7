//! Subcommand handlers.

use std::path::{Path, PathBuf};

use anyhow::{Context as _, bail};
use footy_core::{
  ingest::{Batch, IngestReport, Ingestor, SkippedFile, inspect},
  retrieve::DirectoryRetriever,
  schema::reconcile,
  source::{CSV_EXTENSION, SourceCoordinate},
  store::MatchStore,
};
use footy_store_sqlite::SqliteStore;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::settings::Settings;

async fn open_store(path: &Path) -> anyhow::Result<SqliteStore> {
  SqliteStore::open(path)
    .await
    .with_context(|| format!("failed to open store at {}", path.display()))
}

/// Rebuild the store from every source file in `data_dir`.
pub async fn rebuild(
  settings: &Settings,
  data_dir: Option<PathBuf>,
  confirmed: bool,
  json: bool,
) -> anyhow::Result<()> {
  let data_dir = data_dir.unwrap_or_else(|| settings.data_dir.clone());
  let store_path = &settings.store_path;
  let replacing = store_path.exists();

  if replacing && !confirmed {
    bail!("{} already exists; pass --yes to replace it", store_path.display());
  }

  let batch = Batch::from_dir(&data_dir)
    .with_context(|| format!("failed to scan {}", data_dir.display()))?;
  if batch.is_empty() {
    warn!(dir = %data_dir.display(), "no source files found; store left unchanged");
    return emit(json, batch.skipped(), print_skipped);
  }

  let store = open_store(store_path).await?;
  if replacing {
    let backup = settings.backup_path();
    store
      .backup_to(&backup)
      .await
      .with_context(|| format!("failed to back up store to {}", backup.display()))?;
  }

  let report = Ingestor::new(&store).rebuild(batch).await.context("rebuild failed")?;
  store.close().await.context("failed to close store")?;

  emit(json, &report, print_report)
}

/// Incrementally apply the given files.
pub async fn update(settings: &Settings, files: Vec<PathBuf>, json: bool) -> anyhow::Result<()> {
  let batch = Batch::from_paths(files);
  let store = open_store(&settings.store_path).await?;
  let report = Ingestor::new(&store).update(batch).await.context("update failed")?;
  store.close().await.context("failed to close store")?;

  emit(json, &report, print_report)
}

/// Pull the current season for every configured league and apply it.
/// Incoming files are removed once applied.
pub async fn sync(settings: &Settings, json: bool) -> anyhow::Result<()> {
  let retriever = DirectoryRetriever::new(&settings.incoming_dir);
  let coordinates: Vec<SourceCoordinate> = settings
    .leagues
    .iter()
    .map(|league| SourceCoordinate::new(&settings.current_season, league))
    .collect();

  info!(season = %settings.current_season, leagues = coordinates.len(), "syncing");
  let batch = Batch::fetch(&retriever, coordinates.iter().cloned()).await;

  let store = open_store(&settings.store_path).await?;
  let report = Ingestor::new(&store).update(batch).await.context("sync failed")?;
  store.close().await.context("failed to close store")?;

  let removed = remove_applied(&settings.incoming_dir, &coordinates, &report.skipped)?;
  debug!(files = removed.len(), "removed applied incoming files");

  emit(json, &report, print_report)
}

/// Delete the incoming file of every coordinate that was not skipped. Skipped
/// files stay in place for inspection.
fn remove_applied(
  dir: &Path,
  coordinates: &[SourceCoordinate],
  skipped: &[SkippedFile],
) -> anyhow::Result<Vec<PathBuf>> {
  let mut removed = Vec::new();
  for coordinate in coordinates {
    let name = coordinate.file_name(CSV_EXTENSION);
    if skipped.iter().any(|s| s.file == name) {
      continue;
    }
    let path = coordinate.path_in(dir);
    if path.exists() {
      std::fs::remove_file(&path)
        .with_context(|| format!("failed to remove {}", path.display()))?;
      removed.push(path);
    }
  }
  Ok(removed)
}

#[derive(Serialize)]
struct FileColumns {
  file:    String,
  columns: usize,
}

#[derive(Serialize)]
struct SchemaOutput {
  files:     Vec<FileColumns>,
  common:    usize,
  all:       usize,
  divergent: Vec<String>,
  skipped:   Vec<SkippedFile>,
}

/// Report column drift across the files in `dir` without touching the store.
pub fn schema(settings: &Settings, dir: Option<PathBuf>, json: bool) -> anyhow::Result<()> {
  let dir = dir.unwrap_or_else(|| settings.data_dir.clone());
  let batch =
    Batch::from_dir(&dir).with_context(|| format!("failed to scan {}", dir.display()))?;

  let (profiles, skipped) = inspect(&batch);
  let report = reconcile(&profiles);

  let output = SchemaOutput {
    files: profiles
      .iter()
      .map(|p| FileColumns { file: p.source_file.clone(), columns: p.columns().len() })
      .collect(),
    common: report.common_columns.len(),
    all: report.all_columns.len(),
    divergent: report.divergent_columns().map(str::to_owned).collect(),
    skipped,
  };
  emit(json, &output, print_schema)
}

#[derive(Serialize)]
struct StatusOutput {
  store:      PathBuf,
  total:      u64,
  partitions: Vec<footy_core::store::Partition>,
}

/// Row counts per stored `(Season, League)` pair.
pub async fn status(settings: &Settings, json: bool) -> anyhow::Result<()> {
  let store = open_store(&settings.store_path).await?;
  let total = store.row_count(None).await.context("failed to count rows")?;
  let partitions = store.partitions().await.context("failed to list partitions")?;
  store.close().await.context("failed to close store")?;

  let output = StatusOutput { store: settings.store_path.clone(), total, partitions };
  emit(json, &output, print_status)
}

// ─── Output ──────────────────────────────────────────────────────────────────

fn emit<T: Serialize + ?Sized>(json: bool, value: &T, human: fn(&T)) -> anyhow::Result<()> {
  if json {
    let text = serde_json::to_string_pretty(value).context("failed to serialise output")?;
    println!("{text}");
  } else {
    human(value);
  }
  Ok(())
}

fn print_skipped(skipped: &[SkippedFile]) {
  for s in skipped {
    println!("  skipped {}: {}", s.file, s.reason);
  }
}

fn print_report(report: &IngestReport) {
  println!(
    "{:?}: {} file(s), {} row(s) read, {} written, {} already stored",
    report.mode,
    report.files_loaded,
    report.rows_read,
    report.rows_written,
    report.rows_already_stored,
  );
  if report.unparseable_dates > 0 {
    println!("  {} row(s) with unparseable dates stored with a null Date", report.unparseable_dates);
  }
  if !report.columns_added.is_empty() {
    println!("  new columns: {}", report.columns_added.join(", "));
  }
  if report.schema.has_divergence() {
    let divergent: Vec<&str> = report.schema.divergent_columns().collect();
    println!(
      "  columns: {} common, {} total; not in every file: {}",
      report.schema.common_columns.len(),
      report.schema.all_columns.len(),
      divergent.join(", "),
    );
  }
  print_skipped(&report.skipped);
}

fn print_schema(output: &SchemaOutput) {
  for f in &output.files {
    println!("{}: {} columns", f.file, f.columns);
  }
  println!("common columns: {}", output.common);
  println!("all columns:    {}", output.all);
  if !output.divergent.is_empty() {
    println!("not in every file: {}", output.divergent.join(", "));
  }
  print_skipped(&output.skipped);
}

fn print_status(output: &StatusOutput) {
  println!("{}: {} row(s)", output.store.display(), output.total);
  for p in &output.partitions {
    println!("  {:<10} {:>6}", p.coordinate.to_string(), p.rows);
  }
}
