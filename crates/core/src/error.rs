//! Unified error types for docmerge.
//!
//! Every backend maps its failures onto one of these variants so the
//! processor can tell a cache miss (fall back) from a fatal failure (abort).

use tokio_rusqlite::rusqlite;

/// Unified error types for the document merge pipeline.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid input document (e.g., empty URL).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// Durable insert failed or affected zero rows.
    #[error("WRITE_FAILED: {0}")]
    Write(String),

    /// Cache insert failed after the durable write succeeded.
    #[error("CACHE_WRITE_FAILED: {0}")]
    CacheWrite(String),

    /// No cache entry for the given URL.
    #[error("CACHE_MISS: {0}")]
    CacheMiss(String),

    /// No stored observation for the given URL.
    #[error("NOT_FOUND: {0}")]
    NotFound(String),

    /// Backend read failed during min/max resolution.
    #[error("READ_FAILED: {0}")]
    Read(String),

    /// Database connection or pragma setup failed.
    #[error("STORE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("STORE_ERROR: migration failed: {0}")]
    MigrationFailed(String),

    /// Cache connection setup failed.
    #[error("CACHE_ERROR: {0}")]
    Cache(String),

    /// A cache member could not be encoded or decoded.
    #[error("CODEC_ERROR: {0}")]
    Codec(String),

    /// Operation exceeded its deadline.
    #[error("TIMEOUT: {0}")]
    Timeout(String),
}

impl Error {
    /// Whether this error only signals that the cache had nothing to offer.
    pub fn is_cache_miss(&self) -> bool {
        matches!(self, Error::CacheMiss(_))
    }
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}
