//! `footy`: build and maintain a local store of football match results.
//!
//! # Usage
//!
//! ```text
//! footy rebuild --yes            # replace the store from ./data/*.csv
//! footy update temp/2526_E0.csv  # append unseen matches from files
//! footy sync                     # apply and remove incoming files for the current season
//! footy schema                   # show column drift across source files
//! footy status --json
//! ```

mod commands;
mod settings;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use settings::Settings;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "footy", author, version, about = "Football results store")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "footy.toml", env = "FOOTY_CONFIG")]
  config: PathBuf,

  /// Override the store location from the configuration.
  #[arg(long, value_name = "FILE", global = true)]
  store: Option<PathBuf>,

  /// Print results as JSON instead of text.
  #[arg(long, global = true)]
  json: bool,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Replace the whole store with every source file in a directory.
  Rebuild {
    /// Source directory (defaults to `data_dir`).
    #[arg(long, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    /// Replace an existing store without asking.
    #[arg(short, long)]
    yes: bool,
  },

  /// Append matches not yet stored from the given files.
  Update {
    /// Files named `{season}_{league}.csv`.
    #[arg(required = true)]
    files: Vec<PathBuf>,
  },

  /// Update the current season of every configured league.
  Sync,

  /// Compare column sets across source files.
  Schema {
    /// Source directory (defaults to `data_dir`).
    #[arg(value_name = "DIR")]
    dir: Option<PathBuf>,
  },

  /// Show row counts per season and league.
  Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .with_writer(std::io::stderr)
    .init();

  let cli = Cli::parse();

  let mut settings = Settings::load(&cli.config)?;
  if let Some(store) = cli.store {
    settings.store_path = store;
  }

  match cli.command {
    Command::Rebuild { data_dir, yes } => {
      commands::rebuild(&settings, data_dir, yes, cli.json).await
    }
    Command::Update { files } => commands::update(&settings, files, cli.json).await,
    Command::Sync => commands::sync(&settings, cli.json).await,
    Command::Schema { dir } => commands::schema(&settings, dir, cli.json),
    Command::Status => commands::status(&settings, cli.json).await,
  }
}

#[cfg(test)]
mod tests {
  use clap::CommandFactory;

  use super::*;

  #[test]
  fn cli_definition_is_consistent() { Cli::command().debug_assert(); }

  #[test]
  fn store_and_json_flags_follow_the_subcommand() {
    let cli = Cli::try_parse_from(["footy", "status", "--store", "x.db", "--json"]).unwrap();
    assert_eq!(cli.store, Some(PathBuf::from("x.db")));
    assert!(cli.json);
    assert!(matches!(cli.command, Command::Status));
  }
}
