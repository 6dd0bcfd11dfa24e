//! SQLite backend for the blueprint store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Every mutation runs as one transaction
//! inside a single call on that thread, which is what serialises version
//! numbering and binding writes.

mod encode;
mod ops;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;
