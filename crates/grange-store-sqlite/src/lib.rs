//! SQLite backend for the Grange directory store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated
//! thread without blocking the async runtime. Database failures surface as
//! [`grange_core::Error::Storage`]; domain rule violations detected inside
//! a transaction (last-admin, duplicate slugs) surface as their own
//! [`grange_core::Error`] variants, so no crate-local error type is needed.

mod encode;
mod schema;
mod store;

pub use store::SqliteStore;

#[cfg(test)]
mod tests;
