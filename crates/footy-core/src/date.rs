//! Day-first date normalization.
//!
//! Upstream files write match dates as `dd/mm/yy` or `dd/mm/yyyy`. Everything
//! downstream wants `YYYY-MM-DD`, so the `Date` column is reparsed once during
//! normalization. A value that does not parse is kept as
//! [`MatchDate::Unparseable`] rather than raising.

use std::borrow::Cow;

use chrono::NaiveDate;

/// Two-digit years below this are read as 20xx, the rest as 19xx.
const TWO_DIGIT_PIVOT: i32 = 70;

/// The outcome of reparsing one `Date` cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchDate {
  Parsed(NaiveDate),
  /// The source text, kept so the row can still be keyed.
  Unparseable(String),
}

impl MatchDate {
  pub fn parse(raw: &str) -> Self {
    match parse_day_first(raw) {
      Some(date) => Self::Parsed(date),
      None => Self::Unparseable(raw.to_owned()),
    }
  }

  /// `YYYY-MM-DD`, or `None` when the source text did not parse.
  pub fn to_iso(&self) -> Option<String> {
    match self {
      Self::Parsed(date) => Some(date.format("%Y-%m-%d").to_string()),
      Self::Unparseable(_) => None,
    }
  }

  /// Text used when building a natural key: the canonical form if there is
  /// one, the raw text otherwise.
  pub fn key_text(&self) -> Cow<'_, str> {
    match self {
      Self::Parsed(date) => Cow::Owned(date.format("%Y-%m-%d").to_string()),
      Self::Unparseable(raw) => Cow::Borrowed(raw.as_str()),
    }
  }

  pub fn is_parsed(&self) -> bool { matches!(self, Self::Parsed(_)) }
}

/// Rewrite a day-first date as `YYYY-MM-DD`, or `None` if it is not a valid
/// calendar date under that reading.
pub fn normalize_date(raw: &str) -> Option<String> {
  MatchDate::parse(raw).to_iso()
}

fn parse_day_first(raw: &str) -> Option<NaiveDate> {
  let raw = raw.trim();
  let sep = raw.chars().find(|c| matches!(c, '/' | '-' | '.'))?;

  let mut parts = raw.split(sep);
  let (Some(a), Some(b), Some(c), None) =
    (parts.next(), parts.next(), parts.next(), parts.next())
  else {
    return None;
  };
  if ![a, b, c].iter().all(|p| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit())) {
    return None;
  }

  // Already canonical: YYYY-MM-DD.
  if sep == '-' && a.len() == 4 {
    return NaiveDate::from_ymd_opt(a.parse().ok()?, b.parse().ok()?, c.parse().ok()?);
  }

  if a.len() > 2 || b.len() > 2 {
    return None;
  }
  let day: u32 = a.parse().ok()?;
  let month: u32 = b.parse().ok()?;
  let year: i32 = match c.len() {
    2 => {
      let yy: i32 = c.parse().ok()?;
      if yy < TWO_DIGIT_PIVOT { 2000 + yy } else { 1900 + yy }
    }
    4 => c.parse().ok()?,
    _ => return None,
  };

  NaiveDate::from_ymd_opt(year, month, day)
}
