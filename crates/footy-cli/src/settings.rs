//! Layered settings: built-in defaults, then an optional TOML file, then
//! `FOOTY_*` environment variables.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
  /// Directory scanned by `rebuild`.
  pub data_dir:       PathBuf,
  pub store_path:     PathBuf,
  /// Where `rebuild` copies the previous store. Defaults to
  /// `<store_path>.backup`.
  pub backup_path:    Option<PathBuf>,
  /// Directory `sync` reads freshly retrieved files from.
  pub incoming_dir:   PathBuf,
  pub leagues:        Vec<String>,
  pub current_season: String,
}

impl Default for Settings {
  fn default() -> Self {
    Self {
      data_dir:       PathBuf::from("data"),
      store_path:     PathBuf::from("football.db"),
      backup_path:    None,
      incoming_dir:   PathBuf::from("temp"),
      leagues:        ["E0", "E1", "D1", "D2", "I1", "I2", "SP1", "SP2", "F1", "F2"]
        .map(String::from)
        .to_vec(),
      current_season: "2526".to_owned(),
    }
  }
}

impl Settings {
  pub fn load(file: &Path) -> anyhow::Result<Self> {
    let raw = config::Config::builder()
      .add_source(config::File::from(file).required(false))
      .add_source(
        config::Environment::with_prefix("FOOTY")
          .try_parsing(true)
          .list_separator(",")
          .with_list_parse_key("leagues"),
      )
      .build()
      .with_context(|| format!("failed to read config file {}", file.display()))?;

    let mut settings: Self = raw.try_deserialize().context("failed to deserialise settings")?;
    settings.data_dir = expand_tilde(&settings.data_dir);
    settings.store_path = expand_tilde(&settings.store_path);
    settings.incoming_dir = expand_tilde(&settings.incoming_dir);
    settings.backup_path = settings.backup_path.as_deref().map(expand_tilde);
    Ok(settings)
  }

  pub fn backup_path(&self) -> PathBuf {
    self.backup_path.clone().unwrap_or_else(|| {
      let mut name = self.store_path.clone().into_os_string();
      name.push(".backup");
      PathBuf::from(name)
    })
  }
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
