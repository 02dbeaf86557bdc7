//! Error types for `footy-core`.
//!
//! None of these escalate past a single file: the pipeline turns them into
//! [`SkippedFile`](crate::ingest::SkippedFile) diagnostics and moves on.

use std::path::PathBuf;

use thiserror::Error;

use crate::source::SourceCoordinate;

#[derive(Debug, Error)]
pub enum Error {
  #[error("malformed filename {0:?}: expected <season>_<league>.<ext>")]
  MalformedFilename(String),

  #[error("source {0} is not available")]
  NotAvailable(SourceCoordinate),

  #[error("retrieval of {coordinate} failed: {reason}")]
  RetrievalFailure {
    coordinate: SourceCoordinate,
    reason:     String,
  },

  #[error("{0:?} has no header row")]
  MissingHeader(String),

  #[error("csv error in {file:?}: {source}")]
  Csv {
    file:   String,
    #[source]
    source: csv::Error,
  },

  #[error("i/o error on {path:?}: {source}")]
  Io {
    path:   PathBuf,
    #[source]
    source: std::io::Error,
  },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
