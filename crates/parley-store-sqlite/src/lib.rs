//! SQLite backend for the Parley message log and group directory.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Because every call is executed on that
//! single connection thread, a read-modify-write inside one call is atomic
//! with respect to every other call.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;

#[cfg(test)]
mod tests;
