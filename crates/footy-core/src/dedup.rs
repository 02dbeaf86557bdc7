//! Natural-key deduplication for incremental updates.
//!
//! A match is identified by `(Date, HomeTeam, AwayTeam)` within a
//! `(Season, League)` partition. The key keeps the three parts as separate
//! fields, so no team name can collide with a separator.

use std::{collections::HashSet, fmt};

use crate::{
  date::MatchDate,
  record::{AWAY_TEAM, HOME_TEAM, NormalizedRecord},
  source::SourceCoordinate,
};

// ─── Key ─────────────────────────────────────────────────────────────────────

/// Derived identity of one match. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NaturalKey {
  pub date:      String,
  pub home_team: String,
  pub away_team: String,
}

impl NaturalKey {
  pub fn new(
    date: impl Into<String>,
    home_team: impl Into<String>,
    away_team: impl Into<String>,
  ) -> Self {
    Self { date: date.into(), home_team: home_team.into(), away_team: away_team.into() }
  }

  /// Key for `record`. An unparseable date contributes its raw text; a
  /// missing cell contributes the empty string.
  pub fn of(record: &NormalizedRecord) -> Self {
    let date = record.date.as_ref().map(|d| d.key_text().into_owned()).unwrap_or_default();
    let team = |column: &str| {
      record.field(column).map(|v| v.key_text().into_owned()).unwrap_or_default()
    };
    Self { date, home_team: team(HOME_TEAM), away_team: team(AWAY_TEAM) }
  }
}

impl fmt::Display for NaturalKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}_{}_{}", self.date, self.home_team, self.away_team)
  }
}

// ─── Key set ─────────────────────────────────────────────────────────────────

/// The keys already stored for exactly one `(Season, League)` pair.
#[derive(Debug, Clone)]
pub struct KeySet {
  coordinate: SourceCoordinate,
  keys:       HashSet<NaturalKey>,
}

impl KeySet {
  pub fn new(coordinate: SourceCoordinate, keys: HashSet<NaturalKey>) -> Self {
    Self { coordinate, keys }
  }

  /// First sync for a pair: nothing to diff against.
  pub fn empty(coordinate: SourceCoordinate) -> Self { Self::new(coordinate, HashSet::new()) }

  pub fn coordinate(&self) -> &SourceCoordinate { &self.coordinate }

  pub fn len(&self) -> usize { self.keys.len() }

  pub fn is_empty(&self) -> bool { self.keys.is_empty() }

  /// True only when `record` belongs to this set's pair and its key is
  /// present. Records from other pairs are never matched.
  ///
  /// An unparseable date is stored as null, so such a record also matches
  /// the stored form of its key: empty date, same teams.
  pub fn contains(&self, record: &NormalizedRecord) -> bool {
    if record.coordinate != self.coordinate {
      return false;
    }
    let key = NaturalKey::of(record);
    if self.keys.contains(&key) {
      return true;
    }
    match &record.date {
      Some(MatchDate::Unparseable(_)) => {
        self.keys.contains(&NaturalKey { date: String::new(), ..key })
      }
      _ => false,
    }
  }
}

// ─── Diff ────────────────────────────────────────────────────────────────────

/// Result of diffing an incoming batch against a [`KeySet`].
#[derive(Debug, Default)]
pub struct Dedup {
  /// Incoming records not yet stored, in their original order.
  pub fresh:          Vec<NormalizedRecord>,
  /// How many incoming records were dropped as already stored.
  pub already_stored: usize,
}

/// Keep the incoming records whose key is absent from `existing`.
///
/// Duplicates *within* `incoming` are deliberately left alone: only the store
/// is consulted.
pub fn dedup(incoming: impl IntoIterator<Item = NormalizedRecord>, existing: &KeySet) -> Dedup {
  let mut out = Dedup::default();
  for record in incoming {
    if existing.contains(&record) {
      out.already_stored += 1;
    } else {
      out.fresh.push(record);
    }
  }
  out
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::record::Value;

  fn record(league: &str, date: &str, home: &str, away: &str, fthg: &str) -> NormalizedRecord {
    let coordinate = SourceCoordinate::new("2425", league);
    NormalizedRecord {
      source_file: coordinate.file_name("csv"),
      coordinate,
      date:        Some(MatchDate::parse(date)),
      fields:      vec![
        ("HomeTeam".into(), Value::Text(home.into())),
        ("AwayTeam".into(), Value::Text(away.into())),
        ("FTHG".into(), Value::from_cell(fthg)),
      ],
    }
  }

  fn stored(league: &str, keys: &[NaturalKey]) -> KeySet {
    KeySet::new(SourceCoordinate::new("2425", league), keys.iter().cloned().collect())
  }

  #[test]
  fn key_renders_with_underscores() {
    let key = NaturalKey::of(&record("E0", "15/03/2024", "Arsenal", "Chelsea", "2"));
    assert_eq!(key.to_string(), "2024-03-15_Arsenal_Chelsea");
  }

  #[test]
  fn key_ignores_other_fields() {
    let a = record("E0", "15/03/2024", "Arsenal", "Chelsea", "2");
    let b = record("E0", "15/03/2024", "Arsenal", "Chelsea", "5");
    assert_eq!(NaturalKey::of(&a), NaturalKey::of(&b));
  }

  #[test]
  fn separator_cannot_cause_collisions() {
    assert_ne!(NaturalKey::new("d", "A_B", "C"), NaturalKey::new("d", "A", "B_C"));
  }

  #[test]
  fn unparseable_date_keys_on_raw_text() {
    let key = NaturalKey::of(&record("E0", "31/02/2024", "Arsenal", "Chelsea", ""));
    assert_eq!(key.date, "31/02/2024");
  }

  #[test]
  fn unparseable_date_matches_its_stored_form() {
    // Persisted with a null date, read back as an empty key date.
    let existing = stored("E0", &[NaturalKey::new("", "Leeds", "Hull")]);
    let incoming = vec![
      record("E0", "31/02/2024", "Leeds", "Hull", "1"),
      record("E0", "31/02/2024", "Leeds", "Derby", "1"),
    ];

    let out = dedup(incoming, &existing);
    assert_eq!(out.already_stored, 1);
    assert_eq!(out.fresh.len(), 1);
    assert_eq!(NaturalKey::of(&out.fresh[0]).away_team, "Derby");
  }

  #[test]
  fn parsed_date_never_matches_an_empty_stored_date() {
    let existing = stored("E0", &[NaturalKey::new("", "Leeds", "Hull")]);
    let incoming = vec![record("E0", "15/03/2024", "Leeds", "Hull", "1")];
    assert_eq!(dedup(incoming, &existing).fresh.len(), 1);
  }

  #[test]
  fn returns_only_new_keys() {
    let existing = stored("E0", &[NaturalKey::new("2024-03-15", "Arsenal", "Chelsea")]);
    let incoming = vec![
      record("E0", "15/03/2024", "Arsenal", "Chelsea", "2"),
      record("E0", "15/03/2024", "Arsenal", "Chelsea", "3"),
      record("E0", "16/03/2024", "Fulham", "Spurs", "1"),
    ];

    let out = dedup(incoming, &existing);
    assert_eq!(out.already_stored, 2);
    assert_eq!(out.fresh.len(), 1);
    assert_eq!(NaturalKey::of(&out.fresh[0]).to_string(), "2024-03-16_Fulham_Spurs");
  }

  #[test]
  fn other_pairs_are_never_filtered() {
    let existing = stored("E0", &[NaturalKey::new("2024-03-15", "Arsenal", "Chelsea")]);
    let incoming = vec![record("E1", "15/03/2024", "Arsenal", "Chelsea", "2")];

    let out = dedup(incoming, &existing);
    assert_eq!(out.fresh.len(), 1);
    assert_eq!(out.already_stored, 0);
  }

  #[test]
  fn duplicates_within_batch_are_kept() {
    let existing = KeySet::empty(SourceCoordinate::new("2425", "E0"));
    let incoming = vec![
      record("E0", "15/03/2024", "Arsenal", "Chelsea", "2"),
      record("E0", "15/03/2024", "Arsenal", "Chelsea", "2"),
    ];
    assert_eq!(dedup(incoming, &existing).fresh.len(), 2);
  }

  #[test]
  fn second_pass_over_persisted_output_is_empty() {
    let coordinate = SourceCoordinate::new("2425", "E0");
    let incoming = vec![
      record("E0", "15/03/2024", "Arsenal", "Chelsea", "2"),
      record("E0", "16/03/2024", "Fulham", "Spurs", "1"),
    ];

    let first = dedup(incoming.clone(), &KeySet::empty(coordinate.clone()));
    let persisted = first.fresh.iter().map(NaturalKey::of).collect();
    let second = dedup(incoming, &KeySet::new(coordinate, persisted));

    assert_eq!(first.fresh.len(), 2);
    assert!(second.fresh.is_empty());
  }
}
