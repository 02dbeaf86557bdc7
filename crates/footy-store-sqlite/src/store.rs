//! [`SqliteStore`], the SQLite implementation of [`MatchStore`].

use std::{collections::HashSet, path::Path};

use footy_core::{
  dedup::{KeySet, NaturalKey},
  record::{AWAY_TEAM, DATE, HOME_TEAM, LEAGUE, NormalizedRecord, SEASON},
  source::SourceCoordinate,
  store::{MatchStore, Partition, WriteMode, WriteSummary},
};
use rusqlite::{OptionalExtension as _, TransactionBehavior, types::Value as SqlValue};
use tracing::{debug, info};

use crate::{
  encode::{EncodedRow, encode_record, key_text, quote},
  schema::{ColumnSet, INDEXES, PRAGMAS, TABLE, add_column, create_table, insert_row},
  Error, Result,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A match store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted. All clones
/// share one connection thread, which serialises writers.
#[derive(Clone)]
pub struct SqliteStore {
  pub(crate) conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path`.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init().await?;
    Ok(store)
  }

  /// Open an in-memory store, mainly for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init().await?;
    Ok(store)
  }

  async fn init(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(PRAGMAS)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Write a consistent copy of the whole database to `dest`, replacing any
  /// previous backup there.
  pub async fn backup_to(&self, dest: impl AsRef<Path>) -> Result<()> {
    let dest = dest.as_ref().to_path_buf();
    if dest.exists() {
      std::fs::remove_file(&dest)
        .map_err(|source| Error::Backup { path: dest.clone(), source })?;
    }

    let target = dest.to_string_lossy().into_owned();
    self
      .conn
      .call(move |conn| {
        conn.execute("VACUUM INTO ?1", rusqlite::params![target])?;
        Ok(())
      })
      .await?;

    info!(path = %dest.display(), "backed up store");
    Ok(())
  }

  /// Release the connection.
  pub async fn close(self) -> Result<()> {
    self.conn.close().await?;
    Ok(())
  }
}

// ─── Connection helpers ──────────────────────────────────────────────────────

fn table_exists(conn: &rusqlite::Connection) -> rusqlite::Result<bool> {
  Ok(conn
    .query_row(
      "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
      rusqlite::params![TABLE],
      |_| Ok(true),
    )
    .optional()?
    .unwrap_or(false))
}

/// Current columns of the table; empty if it does not exist yet.
fn table_columns(conn: &rusqlite::Connection) -> rusqlite::Result<ColumnSet> {
  let mut stmt = conn.prepare("SELECT name FROM pragma_table_info(?1) ORDER BY cid")?;
  let names = stmt
    .query_map(rusqlite::params![TABLE], |row| row.get::<_, String>(0))?
    .collect::<rusqlite::Result<Vec<_>>>()?;

  let mut columns = ColumnSet::default();
  for name in &names {
    columns.insert(name);
  }
  Ok(columns)
}

/// Insert every row using one statement over the full column list. Columns a
/// row does not carry are bound as `NULL`.
fn insert_rows(
  conn: &rusqlite::Connection,
  columns: &ColumnSet,
  rows: &[EncodedRow],
) -> rusqlite::Result<usize> {
  let mut stmt = conn.prepare(&insert_row(columns))?;
  for row in rows {
    let mut params = vec![SqlValue::Null; columns.len()];
    for (name, value) in row {
      if let Some(i) = columns.position(name) {
        params[i] = value.clone();
      }
    }
    stmt.execute(rusqlite::params_from_iter(params.iter()))?;
  }
  Ok(rows.len())
}

fn full_rebuild(conn: &mut rusqlite::Connection, rows: &[EncodedRow]) -> rusqlite::Result<WriteSummary> {
  let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

  let mut columns = ColumnSet::with_base();
  for (name, _) in rows.iter().flatten() {
    columns.insert(name);
  }

  tx.execute_batch(&format!("DROP TABLE IF EXISTS {TABLE}"))?;
  tx.execute_batch(&create_table(&columns))?;
  let rows_written = insert_rows(&tx, &columns, rows)?;
  // Built after the load; cheaper than maintaining them row by row.
  tx.execute_batch(INDEXES)?;
  tx.commit()?;

  Ok(WriteSummary { rows_written, columns_added: Vec::new() })
}

fn append(conn: &mut rusqlite::Connection, rows: &[EncodedRow]) -> rusqlite::Result<WriteSummary> {
  let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

  let mut columns = table_columns(&tx)?;
  let mut columns_added = Vec::new();

  if columns.is_empty() {
    columns = ColumnSet::with_base();
    for (name, _) in rows.iter().flatten() {
      columns.insert(name);
    }
    tx.execute_batch(&create_table(&columns))?;
  } else {
    for (name, _) in rows.iter().flatten() {
      if columns.insert(name) {
        tx.execute_batch(&add_column(name))?;
        columns_added.push(name.clone());
      }
    }
  }

  let rows_written = insert_rows(&tx, &columns, rows)?;
  tx.execute_batch(INDEXES)?;
  tx.commit()?;

  Ok(WriteSummary { rows_written, columns_added })
}

// ─── MatchStore impl ─────────────────────────────────────────────────────────

impl MatchStore for SqliteStore {
  type Error = Error;

  async fn existing_keys(&self, coordinate: SourceCoordinate) -> Result<KeySet> {
    let season = coordinate.season.clone();
    let league = coordinate.league.clone();

    let keys: HashSet<NaturalKey> = self
      .conn
      .call(move |conn| {
        if !table_exists(conn)? {
          return Ok(HashSet::new());
        }
        let sql = format!(
          "SELECT {}, {}, {} FROM {TABLE} WHERE {} = ?1 AND {} = ?2",
          quote(DATE),
          quote(HOME_TEAM),
          quote(AWAY_TEAM),
          quote(SEASON),
          quote(LEAGUE),
        );
        let mut stmt = conn.prepare(&sql)?;
        let keys = stmt
          .query_map(rusqlite::params![season, league], |row| {
            Ok(NaturalKey::new(
              key_text(row.get_ref(0)?),
              key_text(row.get_ref(1)?),
              key_text(row.get_ref(2)?),
            ))
          })?
          .collect::<rusqlite::Result<HashSet<_>>>()?;
        Ok(keys)
      })
      .await?;

    debug!(%coordinate, keys = keys.len(), "loaded existing keys");
    Ok(KeySet::new(coordinate, keys))
  }

  async fn write(&self, records: Vec<NormalizedRecord>, mode: WriteMode) -> Result<WriteSummary> {
    let rows: Vec<EncodedRow> = records.iter().map(encode_record).collect();
    drop(records);

    let summary = self
      .conn
      .call(move |conn| {
        let summary = match mode {
          WriteMode::Full => full_rebuild(conn, &rows)?,
          WriteMode::Incremental => append(conn, &rows)?,
        };
        Ok(summary)
      })
      .await?;

    debug!(?mode, rows = summary.rows_written, added = ?summary.columns_added, "write committed");
    Ok(summary)
  }

  async fn row_count(&self, coordinate: Option<SourceCoordinate>) -> Result<u64> {
    let count = self
      .conn
      .call(move |conn| {
        if !table_exists(conn)? {
          return Ok(0);
        }
        let count: i64 = match coordinate {
          Some(c) => conn.query_row(
            &format!(
              "SELECT COUNT(*) FROM {TABLE} WHERE {} = ?1 AND {} = ?2",
              quote(SEASON),
              quote(LEAGUE),
            ),
            rusqlite::params![c.season, c.league],
            |r| r.get(0),
          )?,
          None => conn.query_row(&format!("SELECT COUNT(*) FROM {TABLE}"), [], |r| r.get(0))?,
        };
        Ok(count as u64)
      })
      .await?;
    Ok(count)
  }

  async fn partitions(&self) -> Result<Vec<Partition>> {
    let partitions = self
      .conn
      .call(|conn| {
        if !table_exists(conn)? {
          return Ok(Vec::new());
        }
        let sql = format!(
          "SELECT {s}, {l}, COUNT(*) FROM {TABLE} GROUP BY {s}, {l} ORDER BY {s}, {l}",
          s = quote(SEASON),
          l = quote(LEAGUE),
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map([], |row| {
            Ok(Partition {
              coordinate: SourceCoordinate::new(
                key_text(row.get_ref(0)?),
                key_text(row.get_ref(1)?),
              ),
              rows:       row.get::<_, i64>(2)? as u64,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(partitions)
  }
}
