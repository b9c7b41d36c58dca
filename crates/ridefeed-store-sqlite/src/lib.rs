//! SQLite backend for ride listings.
//!
//! Stores each listing as a JSON document keyed by collection and id, and
//! acts as a realtime source: every committed write re-runs the queries of
//! the affected collection's live subscriptions and pushes fresh snapshots.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated
//! thread without blocking the async runtime.

mod listen;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::{SqliteCollection, SqliteStore};
