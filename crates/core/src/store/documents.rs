//! Observation reads and writes against the `documents` table.

use async_trait::async_trait;
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

use super::connection::DocumentStore;
use crate::observations::{Bound, ObservationStore};
use crate::{Document, Error};

const INSERT: &str = "INSERT INTO documents (url, pub_date, fetch_time, text) VALUES (?1, ?2, ?3, ?4)";

const SELECT_MIN: &str = "SELECT pub_date, fetch_time, text
    FROM documents
    WHERE url = ?1
    ORDER BY fetch_time ASC, id ASC
    LIMIT 1";

const SELECT_MAX: &str = "SELECT pub_date, fetch_time, text
    FROM documents
    WHERE url = ?1
    ORDER BY fetch_time DESC, id DESC
    LIMIT 1";

impl DocumentStore {
    /// Append one observation row.
    ///
    /// Fails with [`Error::Write`] if the insert fails or affects no rows.
    pub async fn insert(&self, doc: &Document) -> Result<(), Error> {
        let (url, pub_date, fetch_time, text) = (doc.url.clone(), doc.pub_date, doc.fetch_time, doc.text.clone());
        tracing::debug!(url = %url, fetch_time, "inserting document");

        self.conn
            .call(move |conn| -> Result<(), Error> {
                let affected = conn
                    .execute(INSERT, params![url, pub_date, fetch_time, text])
                    .map_err(|e| Error::Write(e.to_string()))?;
                if affected == 0 {
                    return Err(Error::Write("zero rows affected".into()));
                }
                Ok(())
            })
            .await
            .map_err(|e| match Error::from(e) {
                Error::Database(e) => Error::Write(e.to_string()),
                e => e,
            })
    }

    /// Select the observation at one end of the fetch-time ordering.
    ///
    /// Ties on fetch time are broken by insertion order: the minimum is the
    /// first-inserted row, the maximum the last-inserted one.
    pub async fn select(&self, url: &str, bound: Bound) -> Result<Document, Error> {
        let url = url.to_string();
        let sql = match bound {
            Bound::Min => SELECT_MIN,
            Bound::Max => SELECT_MAX,
        };
        tracing::debug!(url = %url, bound = bound.as_str(), "selecting document");

        self.conn
            .call(move |conn| -> Result<Document, Error> {
                let result = conn.query_row(sql, params![url], |row| {
                    Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?, row.get::<_, String>(2)?))
                });

                match result {
                    Ok((pub_date, fetch_time, text)) => Ok(Document::new(url, pub_date, fetch_time, text)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Err(Error::NotFound(url)),
                    Err(e) => Err(Error::Read(e.to_string())),
                }
            })
            .await
            .map_err(|e| match Error::from(e) {
                Error::Database(e) => Error::Read(e.to_string()),
                e => e,
            })
    }

    /// Number of stored observations for `url`.
    pub async fn count(&self, url: &str) -> Result<u64, Error> {
        let url = url.to_string();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM documents WHERE url = ?1", params![url], |row| row.get(0))?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }
}

#[async_trait]
impl ObservationStore for DocumentStore {
    fn name(&self) -> &'static str {
        "store"
    }

    async fn add(&self, doc: &Document) -> Result<(), Error> {
        self.insert(doc).await
    }

    async fn get_by_fetch_time_min(&self, url: &str) -> Result<Document, Error> {
        self.select(url, Bound::Min).await
    }

    async fn get_by_fetch_time_max(&self, url: &str) -> Result<Document, Error> {
        self.select(url, Bound::Max).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seeded(docs: &[Document]) -> DocumentStore {
        let db = DocumentStore::open_in_memory().await.unwrap();
        for doc in docs {
            db.add(doc).await.unwrap();
        }
        db
    }

    #[tokio::test]
    async fn test_add_and_select_bounds() {
        let db = seeded(&[
            Document::new("/a", 90, 150, "v1"),
            Document::new("/a", 100, 200, "v2"),
            Document::new("/b", 1, 10, "other"),
        ])
        .await;

        let min = db.get_by_fetch_time_min("/a").await.unwrap();
        assert_eq!(min, Document::new("/a", 90, 150, "v1"));

        let max = db.get_by_fetch_time_max("/a").await.unwrap();
        assert_eq!(max, Document::new("/a", 100, 200, "v2"));

        assert_eq!(db.count("/a").await.unwrap(), 2);
        assert_eq!(db.count("/b").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_out_of_order_writes() {
        let db = seeded(&[Document::new("/a", 1, 100, "late"), Document::new("/a", 2, 50, "early")]).await;

        assert_eq!(db.get_by_fetch_time_min("/a").await.unwrap().text, "early");
        assert_eq!(db.get_by_fetch_time_max("/a").await.unwrap().text, "late");
    }

    #[tokio::test]
    async fn test_ties_follow_insertion_order() {
        let db = seeded(&[
            Document::new("/a", 1, 100, "first"),
            Document::new("/a", 2, 100, "second"),
            Document::new("/a", 3, 100, "third"),
        ])
        .await;

        assert_eq!(db.get_by_fetch_time_min("/a").await.unwrap().text, "first");
        assert_eq!(db.get_by_fetch_time_max("/a").await.unwrap().text, "third");
    }

    #[tokio::test]
    async fn test_select_missing_url() {
        let db = DocumentStore::open_in_memory().await.unwrap();
        let result = db.get_by_fetch_time_min("/missing").await;
        assert!(matches!(result, Err(Error::NotFound(url)) if url == "/missing"));

        let result = db.get_by_fetch_time_max("/missing").await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_zero_rows_affected_is_write_error() {
        let db = DocumentStore::open_in_memory().await.unwrap();
        db.conn
            .call(|conn| {
                conn.execute_batch(
                    "CREATE TRIGGER swallow_inserts BEFORE INSERT ON documents
                     BEGIN SELECT RAISE(IGNORE); END;",
                )
            })
            .await
            .unwrap();

        let result = db.add(&Document::new("/a", 1, 2, "text")).await;
        assert!(matches!(result, Err(Error::Write(msg)) if msg.contains("zero rows")));
        assert_eq!(db.count("/a").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_rows_are_append_only() {
        let db = seeded(&[Document::new("/a", 1, 2, "text")]).await;

        let update = db
            .conn
            .call(|conn| conn.execute("UPDATE documents SET text = 'changed'", []))
            .await;
        assert!(update.is_err());

        let delete = db.conn.call(|conn| conn.execute("DELETE FROM documents", [])).await;
        assert!(delete.is_err());

        assert_eq!(db.get_by_fetch_time_max("/a").await.unwrap().text, "text");
    }
}
