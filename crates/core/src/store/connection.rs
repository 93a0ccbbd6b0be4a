//! Database connection management with pragma configuration.
//!
//! Opens the SQLite database, applies pragmas for concurrent access (WAL
//! mode), and runs migrations.

use super::migrations;
use crate::Error;
use crate::config::StoreConfig;
use std::path::Path;
use tokio_rusqlite::Connection;

const PRAGMAS: &str = "PRAGMA journal_mode=WAL;
     PRAGMA synchronous=NORMAL;
     PRAGMA temp_store=MEMORY;
     PRAGMA foreign_keys=ON;";

/// Durable, append-only store of document observations.
///
/// Wraps a tokio-rusqlite Connection that runs database operations
/// on a background thread. Cloning shares the same connection.
#[derive(Clone, Debug)]
pub struct DocumentStore {
    pub(crate) conn: Connection,
}

impl DocumentStore {
    /// Open the store described by `config`.
    ///
    /// Waits `prepare_delay` first, then opens and migrates the database
    /// under `connect_timeout`.
    pub async fn connect(config: &StoreConfig) -> Result<Self, Error> {
        wait_prepare_delay(config).await;
        within_connect_timeout(config, Self::open(&config.db_path)).await
    }

    /// Open a database at the specified path.
    ///
    /// Creates the file if it doesn't exist, applies pragmas,
    /// and runs any pending migrations.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let conn = Connection::open(path).await.map_err(|e| Error::Database(e.into()))?;
        Self::prepare(conn).await
    }

    /// Open an in-memory database for testing.
    pub async fn open_in_memory() -> Result<Self, Error> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| Error::Database(e.into()))?;
        Self::prepare(conn).await
    }

    async fn prepare(conn: Connection) -> Result<Self, Error> {
        conn.call(|conn| {
            conn.execute_batch(PRAGMAS)?;
            Ok(())
        })
        .await
        .map_err(Error::Database)?;

        migrations::run(&conn).await?;

        Ok(Self { conn })
    }
}

async fn wait_prepare_delay(config: &StoreConfig) {
    let delay = config.prepare_delay();
    if !delay.is_zero() {
        tracing::debug!(delay_secs = config.prepare_delay_secs, "waiting before opening store");
        tokio::time::sleep(delay).await;
    }
}

async fn within_connect_timeout(
    config: &StoreConfig, open: impl Future<Output = Result<DocumentStore, Error>>,
) -> Result<DocumentStore, Error> {
    tokio::time::timeout(config.connect_timeout(), open).await.map_err(|_| {
        Error::Timeout(format!(
            "opening store at {} took longer than {}s",
            config.db_path.display(),
            config.connect_timeout_secs
        ))
    })?
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;

    #[tokio::test]
    async fn test_open_in_memory() {
        let db = DocumentStore::open_in_memory().await.unwrap();
        let version = db
            .conn
            .call(|conn| conn.query_row("SELECT sqlite_version()", [], |row| row.get::<_, String>(0)))
            .await
            .unwrap();
        assert!(!version.is_empty());
    }

    #[tokio::test]
    async fn test_connect_with_config() {
        let config = StoreConfig { db_path: PathBuf::from(":memory:"), ..Default::default() };
        let db = DocumentStore::connect(&config).await.unwrap();
        assert_eq!(db.count("/a").await.unwrap(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_prepare_delay_waits() {
        let config = StoreConfig { prepare_delay_secs: 5, ..Default::default() };
        let start = tokio::time::Instant::now();
        wait_prepare_delay(&config).await;
        assert!(start.elapsed() >= Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_prepare_delay_returns_immediately() {
        let start = tokio::time::Instant::now();
        wait_prepare_delay(&StoreConfig::default()).await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_open_times_out() {
        let config = StoreConfig { connect_timeout_secs: 3, ..Default::default() };
        let start = tokio::time::Instant::now();

        let result = within_connect_timeout(&config, std::future::pending()).await;
        assert!(matches!(result, Err(Error::Timeout(msg)) if msg.contains("docmerge.sqlite")));
        assert!(start.elapsed() >= Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_open_error_passes_through_timeout() {
        let config = StoreConfig::default();
        let result = within_connect_timeout(&config, async { Err(Error::MigrationFailed("boom".into())) }).await;
        assert!(matches!(result, Err(Error::MigrationFailed(_))));
    }
}
