//! Merge processor.
//!
//! Writes each incoming observation to the store and the cache, then reads
//! back the earliest and latest observation of its URL (cache first, store on
//! a miss) and merges them into the returned document.

use std::sync::Arc;
use std::time::Duration;

use crate::config::AppConfig;
use crate::observations::{Bound, Fallback, ObservationStore};
use crate::{Document, Error};

/// What a failed cache write does to the merge call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CacheWritePolicy {
    /// Fail the call with [`Error::CacheWrite`].
    #[default]
    Strict,
    /// Log a warning, drop the URL's cache set and resolve from the store.
    Tolerant,
}

/// Stateless merge pipeline over a durable store and an accelerator cache.
///
/// Cloning is cheap and clones share both backends, so one processor can
/// serve any number of concurrent calls. Calls for the same URL are not
/// serialized against each other.
#[derive(Clone)]
pub struct DocumentProcessor {
    store: Arc<dyn ObservationStore>,
    cache: Arc<dyn ObservationStore>,
    readers: Fallback,
    store_only: Fallback,
    cache_writes: CacheWritePolicy,
    timeout: Option<Duration>,
}

impl DocumentProcessor {
    pub fn new(store: Arc<dyn ObservationStore>, cache: Arc<dyn ObservationStore>) -> Self {
        let readers = Fallback::new(vec![cache.clone(), store.clone()]);
        let store_only = Fallback::new(vec![store.clone()]);
        Self { store, cache, readers, store_only, cache_writes: CacheWritePolicy::default(), timeout: None }
    }

    /// Processor with the cache-write policy and deadline from `config`.
    pub fn from_config(
        store: Arc<dyn ObservationStore>, cache: Arc<dyn ObservationStore>, config: &AppConfig,
    ) -> Self {
        let policy = if config.cache.strict_writes { CacheWritePolicy::Strict } else { CacheWritePolicy::Tolerant };
        Self::new(store, cache)
            .with_cache_write_policy(policy)
            .with_timeout(config.process_timeout())
    }

    pub fn with_cache_write_policy(mut self, policy: CacheWritePolicy) -> Self {
        self.cache_writes = policy;
        self
    }

    /// Bound the whole call. On expiry the remaining steps never run.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Record `doc` and return it merged with every known observation of its URL.
    ///
    /// The result keeps the URL, takes `pub_date` and `first_fetch_time` from
    /// the earliest observation and `text` and `fetch_time` from the latest.
    ///
    /// # Errors
    ///
    /// Any failure aborts the remaining steps; no partial document is returned.
    /// A failed durable write never reaches the cache.
    pub async fn process(&self, doc: Document) -> Result<Document, Error> {
        doc.validate()?;

        match self.timeout {
            Some(limit) => {
                let url = doc.url.clone();
                tokio::time::timeout(limit, self.merge(doc)).await.map_err(|_| {
                    tracing::warn!(url = %url, timeout_ms = limit.as_millis() as u64, "merge timed out");
                    Error::Timeout(format!("merging {url} took longer than {}ms", limit.as_millis()))
                })?
            }
            None => self.merge(doc).await,
        }
    }

    async fn merge(&self, mut doc: Document) -> Result<Document, Error> {
        tracing::debug!(url = %doc.url, fetch_time = doc.fetch_time, "processing document");

        if let Err(e) = self.store.add(&doc).await {
            tracing::warn!(url = %doc.url, error = %e, "durable write failed");
            return Err(e);
        }

        let readers = match self.mirror(&doc).await {
            Ok(()) => &self.readers,
            Err(e @ Error::CacheWrite(_)) if self.cache_writes == CacheWritePolicy::Tolerant => {
                tracing::warn!(url = %doc.url, error = %e, "cache write failed, resolving from store");
                if let Err(e) = self.cache.invalidate(&doc.url).await {
                    tracing::warn!(url = %doc.url, error = %e, "could not drop stale cache set");
                }
                &self.store_only
            }
            Err(e) => {
                tracing::warn!(url = %doc.url, error = %e, "cache write failed");
                return Err(e);
            }
        };

        let earliest = readers.resolve(&doc.url, Bound::Min).await?;
        doc.pub_date = earliest.pub_date;
        doc.first_fetch_time = Some(earliest.fetch_time);

        let latest = readers.resolve(&doc.url, Bound::Max).await?;
        doc.text = latest.text;
        doc.fetch_time = latest.fetch_time;

        tracing::debug!(
            url = %doc.url,
            first_fetch_time = earliest.fetch_time,
            fetch_time = doc.fetch_time,
            "merged document"
        );
        Ok(doc)
    }

    /// Copy a freshly stored observation into the cache.
    ///
    /// The append only lands in a live set. A cold set is seeded with the
    /// store's current extremes in one batch instead, so the cache never
    /// answers min/max from a partial set after an expiry.
    async fn mirror(&self, doc: &Document) -> Result<(), Error> {
        if self.cache.add_if_live(doc).await? {
            return Ok(());
        }

        let earliest = self.store.get_by_fetch_time_min(&doc.url).await?;
        let latest = self.store.get_by_fetch_time_max(&doc.url).await?;
        tracing::debug!(url = %doc.url, backend = self.cache.name(), "seeding cold cache set");

        let seed = if latest == earliest { vec![earliest] } else { vec![earliest, latest] };
        self.cache.seed(&seed).await
    }
}
