//! SQLite backend for the footy match store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Every write runs inside a single
//! `IMMEDIATE` transaction, so a failed write leaves no partial rows behind.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;
