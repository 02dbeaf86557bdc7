//! Core types and pipeline logic for the footy match-result store.
//!
//! This crate is deliberately free of database dependencies. Storage backends
//! implement [`store::MatchStore`]; the CLI drives [`ingest::Ingestor`] against
//! whichever backend it opened.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod date;
pub mod dedup;
pub mod error;
pub mod ingest;
pub mod normalize;
pub mod record;
pub mod retrieve;
pub mod schema;
pub mod source;
pub mod store;

pub use error::{Error, Result};
