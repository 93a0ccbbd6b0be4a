//! Core types and shared functionality for docmerge.
//!
//! This crate provides:
//! - The document observation model and unified error types
//! - A SQLite-backed, append-only store of observations
//! - Sorted-set accelerator caches (in-process and Redis)
//! - The merge processor that combines them
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod document;
pub mod error;
pub mod observations;
pub mod processor;
pub mod store;

pub use config::AppConfig;
pub use document::Document;
pub use error::Error;
pub use observations::{Bound, Fallback, ObservationStore};
pub use processor::{CacheWritePolicy, DocumentProcessor};
pub use store::DocumentStore;
