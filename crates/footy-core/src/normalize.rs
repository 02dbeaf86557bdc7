//! Record normalizer: raw CSV bytes → [`NormalizedRecord`]s.
//!
//! Decoding is UTF-8 with a Latin-1 fallback, since older upstream files are
//! not UTF-8. Headers are trimmed; the `Date` column is reparsed day-first;
//! every other cell is kept exactly as written. Provenance columns are always
//! stamped from the [`RawFile`], never taken from the data.

use std::{borrow::Cow, io::Cursor};

use tracing::debug;

use crate::{
  date::MatchDate,
  record::{DATE, NormalizedRecord, PROVENANCE_COLUMNS, Value},
  schema::SchemaProfile,
  source::{RawFile, SourceCoordinate},
  Error, Result,
};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

type RowIter<'a> = csv::StringRecordsIntoIter<Cursor<Cow<'a, [u8]>>>;

#[derive(Debug, Clone)]
enum Target {
  Date,
  Field(String),
}

#[derive(Debug, Clone)]
struct Column {
  index:  usize,
  target: Target,
}

/// Lazy sequence of records for one file. Created by [`normalize`].
///
/// Each item is a `Result` because the underlying CSV reader can fail mid-way
/// (e.g. a broken quote). Callers that need all-or-nothing semantics collect
/// into `Result<Vec<_>>`.
pub struct Records<'a> {
  coordinate:  &'a SourceCoordinate,
  source_file: &'a str,
  columns:     Vec<Column>,
  profile:     SchemaProfile,
  rows:        RowIter<'a>,
}

/// Start normalizing `raw`. Only the header row is read eagerly.
///
/// Calling this again on the same [`RawFile`] yields the same sequence.
pub fn normalize(raw: &RawFile) -> Result<Records<'_>> {
  let csv_err = |source| Error::Csv { file: raw.name.clone(), source };

  let mut reader = csv::ReaderBuilder::new()
    .flexible(true)
    .from_reader(Cursor::new(decode(&raw.bytes)));

  let headers = reader.headers().map_err(csv_err)?.clone();

  let mut observed: Vec<String> = Vec::with_capacity(headers.len());
  let mut columns: Vec<Column> = Vec::with_capacity(headers.len());

  for (index, header) in headers.iter().enumerate() {
    let name = header.trim();
    if name.is_empty() {
      continue;
    }

    // Column identity ignores ASCII case, as in the store. A repeated header
    // keeps its first position and spelling but takes the later cell.
    if observed.iter().any(|n| n.eq_ignore_ascii_case(name)) {
      if let Some(col) = columns.iter_mut().find(|c| c.target.name().eq_ignore_ascii_case(name)) {
        col.index = index;
      }
      continue;
    }
    observed.push(name.to_owned());

    if PROVENANCE_COLUMNS.iter().any(|p| p.eq_ignore_ascii_case(name)) {
      continue;
    }
    let target = if name.eq_ignore_ascii_case(DATE) {
      Target::Date
    } else {
      Target::Field(name.to_owned())
    };
    columns.push(Column { index, target });
  }

  if observed.is_empty() {
    return Err(Error::MissingHeader(raw.name.clone()));
  }

  debug!(file = %raw.name, columns = observed.len(), "read header");

  Ok(Records {
    coordinate:  &raw.coordinate,
    source_file: &raw.name,
    columns,
    profile:     SchemaProfile::new(raw.name.clone(), observed),
    rows:        reader.into_records(),
  })
}

impl Records<'_> {
  /// Column names observed in this file's header.
  pub fn profile(&self) -> &SchemaProfile { &self.profile }

  fn build(&self, row: &csv::StringRecord) -> NormalizedRecord {
    let mut date = None;
    let mut fields = Vec::with_capacity(self.columns.len());

    for col in &self.columns {
      let cell = row.get(col.index).unwrap_or("");
      match &col.target {
        Target::Date => {
          if !cell.trim().is_empty() {
            let parsed = MatchDate::parse(cell);
            if !parsed.is_parsed() {
              debug!(file = %self.source_file, raw = cell, "unparseable date");
            }
            date = Some(parsed);
          }
        }
        Target::Field(name) => fields.push((name.clone(), Value::from_cell(cell))),
      }
    }

    NormalizedRecord {
      coordinate: self.coordinate.clone(),
      source_file: self.source_file.to_owned(),
      date,
      fields,
    }
  }
}

impl Iterator for Records<'_> {
  type Item = Result<NormalizedRecord>;

  fn next(&mut self) -> Option<Self::Item> {
    loop {
      let row = match self.rows.next()? {
        Ok(row) => row,
        Err(source) => {
          return Some(Err(Error::Csv { file: self.source_file.to_owned(), source }));
        }
      };
      // Trailing padding rows (",,,,") carry no data.
      if row.iter().all(|cell| cell.trim().is_empty()) {
        continue;
      }
      return Some(Ok(self.build(&row)));
    }
  }
}

impl Target {
  fn name(&self) -> &str {
    match self {
      Target::Date => DATE,
      Target::Field(name) => name,
    }
  }
}

/// Strip a UTF-8 BOM and fall back to Latin-1 when the bytes are not UTF-8.
fn decode(bytes: &[u8]) -> Cow<'_, [u8]> {
  let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
  if std::str::from_utf8(bytes).is_ok() {
    return Cow::Borrowed(bytes);
  }
  let text: String = bytes.iter().map(|&b| char::from(b)).collect();
  Cow::Owned(text.into_bytes())
}

#[cfg(test)]
mod tests {
  use super::*;

  fn raw(csv: &str) -> RawFile {
    RawFile::tagged(SourceCoordinate::new("2425", "E0"), csv.as_bytes().to_vec())
  }

  fn collect(raw: &RawFile) -> Vec<NormalizedRecord> {
    normalize(raw).unwrap().collect::<Result<Vec<_>>>().unwrap()
  }

  #[test]
  fn trims_headers_and_rewrites_dates() {
    let file = raw(" Div ,Date , HomeTeam,AwayTeam,FTHG\nE0,15/03/2024,Arsenal,Chelsea,2\n");
    let records = collect(&file);

    assert_eq!(records.len(), 1);
    let r = &records[0];
    assert_eq!(r.get("Div"), Some(Value::Text("E0".into())));
    assert_eq!(r.get("Date"), Some(Value::Text("2024-03-15".into())));
    assert_eq!(r.get("HomeTeam"), Some(Value::Text("Arsenal".into())));
    // No numeric coercion.
    assert_eq!(r.get("FTHG"), Some(Value::Text("2".into())));
  }

  #[test]
  fn unparseable_date_becomes_null_without_failing() {
    let file = raw("Date,HomeTeam,AwayTeam\n31/02/2024,Fulham,Spurs\n16/03/2024,Fulham,Spurs\n");
    let records = collect(&file);

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].get("Date"), Some(Value::Null));
    assert_eq!(records[0].date, Some(MatchDate::Unparseable("31/02/2024".into())));
    assert_eq!(records[1].get("Date"), Some(Value::Text("2024-03-16".into())));
  }

  #[test]
  fn provenance_overrides_source_columns() {
    let file = raw("Season,League,SourceFile,HomeTeam\n1999,XX,bogus.csv,Leeds\n");
    let r = &collect(&file)[0];

    assert_eq!(r.get("Season"), Some(Value::Text("2425".into())));
    assert_eq!(r.get("League"), Some(Value::Text("E0".into())));
    assert_eq!(r.get("SourceFile"), Some(Value::Text("2425_E0.csv".into())));
    assert_eq!(r.fields.len(), 1);
  }

  #[test]
  fn headers_differing_only_in_case_are_one_column() {
    let file = raw("date,HomeTeam,Referee,referee,season\n15/03/2024,Leeds,X,Y,1999\n");
    let records = normalize(&file).unwrap();
    assert_eq!(records.profile().columns(), ["date", "HomeTeam", "Referee", "season"]);

    let r = &records.collect::<Result<Vec<_>>>().unwrap()[0];
    assert_eq!(r.get("Date"), Some(Value::Text("2024-03-15".into())));
    assert_eq!(r.get("Referee"), Some(Value::Text("Y".into())));
    assert_eq!(r.get("Season"), Some(Value::Text("2425".into())));
    assert_eq!(r.fields.len(), 2);
  }

  #[test]
  fn sequence_is_restartable() {
    let file = raw("Date,HomeTeam,AwayTeam\n15/03/2024,Arsenal,Chelsea\n16/03/2024,Fulham,Spurs\n");
    assert_eq!(collect(&file), collect(&file));
  }

  #[test]
  fn skips_padding_rows_and_empty_headers() {
    let file = raw("Date,HomeTeam,AwayTeam,,\n15/03/2024,Arsenal,Chelsea,,\n,,,,\n");
    let records = normalize(&file).unwrap();
    assert_eq!(records.profile().columns(), ["Date", "HomeTeam", "AwayTeam"]);
    assert_eq!(records.count(), 1);
  }

  #[test]
  fn short_rows_yield_nulls() {
    let file = raw("Date,HomeTeam,AwayTeam,Referee\n15/03/2024,Arsenal,Chelsea\n");
    let r = &collect(&file)[0];
    assert_eq!(r.get("Referee"), Some(Value::Null));
  }

  #[test]
  fn bom_and_latin1_are_decoded() {
    let mut bytes = UTF8_BOM.to_vec();
    bytes.extend_from_slice(b"Div,HomeTeam\nSP1,Atl\xe9tico\n");
    let file = RawFile::tagged(SourceCoordinate::new("2425", "SP1"), bytes);
    let r = &collect(&file)[0];

    assert_eq!(r.get("Div"), Some(Value::Text("SP1".into())));
    assert_eq!(r.get("HomeTeam"), Some(Value::Text("Atlético".into())));
  }

  #[test]
  fn empty_file_has_no_header() {
    let err = normalize(&raw("")).err().unwrap();
    assert!(matches!(err, Error::MissingHeader(_)));
  }
}
