//! Retrieval collaborator interface.
//!
//! Transport is not this crate's concern; a retriever only has to hand back
//! bytes tagged with the coordinate they were fetched for, or say the source
//! is not available.

use std::{future::Future, io::ErrorKind, path::PathBuf};

use crate::{
  source::{RawFile, SourceCoordinate},
  Error, Result,
};

pub trait Retriever: Send + Sync {
  /// Fetch the file for `coordinate`. Fails with [`Error::NotAvailable`] when
  /// the source does not have it, or [`Error::RetrievalFailure`] otherwise.
  fn fetch(
    &self,
    coordinate: SourceCoordinate,
  ) -> impl Future<Output = Result<RawFile>> + Send + '_;
}

/// Reads `{season}_{league}.csv` from a drop directory.
#[derive(Debug, Clone)]
pub struct DirectoryRetriever {
  dir: PathBuf,
}

impl DirectoryRetriever {
  pub fn new(dir: impl Into<PathBuf>) -> Self { Self { dir: dir.into() } }
}

impl Retriever for DirectoryRetriever {
  async fn fetch(&self, coordinate: SourceCoordinate) -> Result<RawFile> {
    let path = coordinate.path_in(&self.dir);
    match std::fs::read(&path) {
      Ok(bytes) => Ok(RawFile::tagged(coordinate, bytes)),
      Err(e) if e.kind() == ErrorKind::NotFound => Err(Error::NotAvailable(coordinate)),
      Err(e) => Err(Error::RetrievalFailure { coordinate, reason: e.to_string() }),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn fetches_by_convention() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("2526_E0.csv"), "Date\n01/08/2025\n").unwrap();

    let retriever = DirectoryRetriever::new(dir.path());
    let raw = retriever.fetch(SourceCoordinate::new("2526", "E0")).await.unwrap();
    assert_eq!(raw.coordinate, SourceCoordinate::new("2526", "E0"));
    assert_eq!(raw.name, "2526_E0.csv");
    assert_eq!(raw.bytes, b"Date\n01/08/2025\n");
  }

  #[tokio::test]
  async fn missing_file_is_not_available() {
    let dir = tempfile::tempdir().unwrap();
    let retriever = DirectoryRetriever::new(dir.path());

    let err = retriever.fetch(SourceCoordinate::new("2526", "D1")).await.unwrap_err();
    assert!(matches!(err, Error::NotAvailable(c) if c.league == "D1"));
  }
}
