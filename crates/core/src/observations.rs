//! The accessor contract shared by the durable store and the cache.
//!
//! Both backends hold the same observations, ordered by fetch time. Reads go
//! through a [`Fallback`] chain so that a cache miss is answered by the store.

use std::sync::Arc;

use async_trait::async_trait;

use crate::{Document, Error};

/// Which end of the fetch-time ordering to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    Min,
    Max,
}

impl Bound {
    pub fn as_str(self) -> &'static str {
        match self {
            Bound::Min => "min",
            Bound::Max => "max",
        }
    }
}

/// A backend holding time-ordered observations keyed by URL.
///
/// Among observations with equal fetch times, the minimum is the
/// earliest-inserted one and the maximum is the latest-inserted one.
#[async_trait]
pub trait ObservationStore: Send + Sync {
    /// Short backend name for log fields.
    fn name(&self) -> &'static str;

    /// Append one observation.
    async fn add(&self, doc: &Document) -> Result<(), Error>;

    /// Observation with the smallest fetch time for `url`.
    async fn get_by_fetch_time_min(&self, url: &str) -> Result<Document, Error>;

    /// Observation with the largest fetch time for `url`.
    async fn get_by_fetch_time_max(&self, url: &str) -> Result<Document, Error>;

    /// Append `doc` only if its URL already has a live set, in one step.
    ///
    /// Returns `false` and leaves the backend untouched when the set is
    /// absent or expired. Durable backends have no expiry and always append.
    async fn add_if_live(&self, doc: &Document) -> Result<bool, Error> {
        self.add(doc).await.map(|()| true)
    }

    /// Append several observations of one URL, creating its set if needed.
    ///
    /// Caches apply the whole batch at once, so readers never observe part
    /// of it in a freshly created set.
    async fn seed(&self, docs: &[Document]) -> Result<(), Error> {
        for doc in docs {
            self.add(doc).await?;
        }
        Ok(())
    }

    /// Forget everything held for `url`. Durable backends keep their rows.
    async fn invalidate(&self, _url: &str) -> Result<(), Error> {
        Ok(())
    }

    async fn get_by_fetch_time(&self, url: &str, bound: Bound) -> Result<Document, Error> {
        match bound {
            Bound::Min => self.get_by_fetch_time_min(url).await,
            Bound::Max => self.get_by_fetch_time_max(url).await,
        }
    }
}

/// Ordered list of readers tried in sequence.
///
/// A [`Error::CacheMiss`] moves on to the next reader. Any other error is
/// returned as is. If every reader misses, the last miss is returned.
#[derive(Clone)]
pub struct Fallback {
    readers: Vec<Arc<dyn ObservationStore>>,
}

impl Fallback {
    pub fn new(readers: Vec<Arc<dyn ObservationStore>>) -> Self {
        Self { readers }
    }

    pub async fn resolve(&self, url: &str, bound: Bound) -> Result<Document, Error> {
        let mut last_miss = Error::CacheMiss(url.to_string());

        for reader in &self.readers {
            match reader.get_by_fetch_time(url, bound).await {
                Ok(doc) => {
                    tracing::debug!(backend = reader.name(), bound = bound.as_str(), url, "resolved observation");
                    return Ok(doc);
                }
                Err(e) if e.is_cache_miss() => {
                    tracing::debug!(backend = reader.name(), bound = bound.as_str(), url, "miss, trying next reader");
                    last_miss = e;
                }
                Err(e) => {
                    tracing::warn!(backend = reader.name(), bound = bound.as_str(), url, error = %e, "read failed");
                    return Err(e);
                }
            }
        }

        Err(last_miss)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Reader that answers every query with a fixed outcome and counts calls.
    struct Fixed {
        outcome: fn(&str) -> Result<Document, Error>,
        calls: AtomicUsize,
    }

    impl Fixed {
        fn new(outcome: fn(&str) -> Result<Document, Error>) -> Arc<Self> {
            Arc::new(Self { outcome, calls: AtomicUsize::new(0) })
        }
    }

    #[async_trait]
    impl ObservationStore for Fixed {
        fn name(&self) -> &'static str {
            "fixed"
        }

        async fn add(&self, _doc: &Document) -> Result<(), Error> {
            Ok(())
        }

        async fn get_by_fetch_time_min(&self, url: &str) -> Result<Document, Error> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (self.outcome)(url)
        }

        async fn get_by_fetch_time_max(&self, url: &str) -> Result<Document, Error> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (self.outcome)(url)
        }
    }

    fn miss(url: &str) -> Result<Document, Error> {
        Err(Error::CacheMiss(url.to_string()))
    }

    fn hit(url: &str) -> Result<Document, Error> {
        Ok(Document::new(url, 1, 2, "hit"))
    }

    fn fail(_url: &str) -> Result<Document, Error> {
        Err(Error::Read("backend down".into()))
    }

    #[tokio::test]
    async fn test_first_hit_wins() {
        let first = Fixed::new(hit);
        let second = Fixed::new(hit);
        let chain = Fallback::new(vec![first.clone(), second.clone()]);

        let doc = chain.resolve("/a", Bound::Min).await.unwrap();
        assert_eq!(doc.text, "hit");
        assert_eq!(first.calls.load(Ordering::SeqCst), 1);
        assert_eq!(second.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_miss_falls_through() {
        let first = Fixed::new(miss);
        let second = Fixed::new(hit);
        let chain = Fallback::new(vec![first.clone(), second.clone()]);

        let doc = chain.resolve("/a", Bound::Max).await.unwrap();
        assert_eq!(doc.url, "/a");
        assert_eq!(second.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_error_stops_chain() {
        let first = Fixed::new(fail);
        let second = Fixed::new(hit);
        let chain = Fallback::new(vec![first, second.clone()]);

        let result = chain.resolve("/a", Bound::Min).await;
        assert!(matches!(result, Err(Error::Read(_))));
        assert_eq!(second.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_all_miss() {
        let chain = Fallback::new(vec![Fixed::new(miss), Fixed::new(miss)]);
        let result = chain.resolve("/a", Bound::Min).await;
        assert!(matches!(result, Err(Error::CacheMiss(url)) if url == "/a"));
    }
}
