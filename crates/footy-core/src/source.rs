//! Source coordinates and raw files.
//!
//! A [`SourceCoordinate`] names exactly one upstream file. Files on disk follow
//! the `{season}_{league}.<ext>` convention; [`SourceCoordinate::from_file_name`]
//! recovers the coordinate from that grammar when the caller cannot supply it
//! directly.

use std::{
  fmt,
  path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Extension used for files written under the naming convention.
pub const CSV_EXTENSION: &str = "csv";

// ─── Coordinate ──────────────────────────────────────────────────────────────

/// A `(season, league)` pair identifying one raw file.
///
/// Both tokens are opaque: `"2425"` is not checked against a calendar and
/// `"SP1"` is not checked against a list of known divisions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SourceCoordinate {
  pub season: String,
  pub league: String,
}

impl SourceCoordinate {
  pub fn new(season: impl Into<String>, league: impl Into<String>) -> Self {
    Self { season: season.into(), league: league.into() }
  }

  /// `{season}_{league}.{ext}`.
  pub fn file_name(&self, ext: &str) -> String {
    format!("{}_{}.{ext}", self.season, self.league)
  }

  /// Where the CSV for this coordinate lives inside `dir`.
  pub fn path_in(&self, dir: impl AsRef<Path>) -> PathBuf {
    dir.as_ref().join(self.file_name(CSV_EXTENSION))
  }

  /// Parse `<season>_<league>.<ext>`.
  ///
  /// Exactly two non-empty underscore-delimited tokens are required before a
  /// non-empty extension.
  pub fn from_file_name(name: &str) -> Result<Self> {
    let malformed = || Error::MalformedFilename(name.to_owned());

    let (stem, ext) = name.rsplit_once('.').ok_or_else(malformed)?;
    if ext.is_empty() {
      return Err(malformed());
    }

    let mut tokens = stem.split('_');
    let (Some(season), Some(league), None) =
      (tokens.next(), tokens.next(), tokens.next())
    else {
      return Err(malformed());
    };
    if season.is_empty() || league.is_empty() {
      return Err(malformed());
    }

    Ok(Self::new(season, league))
  }

  /// Like [`from_file_name`](Self::from_file_name), using the final path
  /// component.
  pub fn from_path(path: &Path) -> Result<Self> {
    let name = path
      .file_name()
      .and_then(|n| n.to_str())
      .ok_or_else(|| Error::MalformedFilename(path.display().to_string()))?;
    Self::from_file_name(name)
  }
}

impl fmt::Display for SourceCoordinate {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}/{}", self.season, self.league)
  }
}

// ─── Raw file ────────────────────────────────────────────────────────────────

/// Undecoded file contents plus the coordinate they belong to.
///
/// Lives only between retrieval and normalization.
#[derive(Debug, Clone)]
pub struct RawFile {
  pub coordinate: SourceCoordinate,
  /// File identity, stamped into every record as `SourceFile`.
  pub name:       String,
  pub bytes:      Vec<u8>,
}

impl RawFile {
  /// Bytes whose coordinate is known up front. The file is named by
  /// convention.
  pub fn tagged(coordinate: SourceCoordinate, bytes: Vec<u8>) -> Self {
    let name = coordinate.file_name(CSV_EXTENSION);
    Self { coordinate, name, bytes }
  }

  /// Read a file from disk, deriving its coordinate from the file name.
  pub fn from_path(path: &Path) -> Result<Self> {
    let coordinate = SourceCoordinate::from_path(path)?;
    let bytes = std::fs::read(path)
      .map_err(|source| Error::Io { path: path.to_path_buf(), source })?;
    let name = path
      .file_name()
      .map(|n| n.to_string_lossy().into_owned())
      .unwrap_or_else(|| coordinate.file_name(CSV_EXTENSION));
    Ok(Self { coordinate, name, bytes })
  }
}
