//! SQLite-backed system of record for document observations.
//!
//! Observations are append-only rows in a `documents` table, queried for the
//! earliest and latest fetch per URL. Access is async via tokio-rusqlite.

pub mod connection;
pub mod documents;
pub mod migrations;

pub use connection::DocumentStore;
