//! In-process sorted-set cache.
//!
//! Each URL owns a `BTreeMap` keyed by `(fetch_time, seq)`, so the first and
//! last entries are the minimum and maximum with insertion order breaking
//! ties. The per-URL sets live in a moka cache whose time-to-live restarts on
//! every write, so a set expires `ttl` after its most recent write and
//! abandoned URLs are reclaimed by moka's housekeeping.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use moka::ops::compute::{CompResult, Op};
use tokio::sync::RwLock;

use crate::observations::{Bound, ObservationStore};
use crate::{Document, Error};

#[derive(Debug, Default)]
struct SortedSet {
    members: BTreeMap<(i64, u64), Document>,
    next_seq: u64,
}

impl SortedSet {
    fn push(&mut self, doc: &Document) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.members.insert((doc.fetch_time, seq), Document { first_fetch_time: None, ..doc.clone() });
    }

    fn bound(&self, bound: Bound) -> Option<&Document> {
        let entry = match bound {
            Bound::Min => self.members.first_key_value(),
            Bound::Max => self.members.last_key_value(),
        };
        entry.map(|(_, doc)| doc)
    }
}

type SharedSet = Arc<RwLock<SortedSet>>;

/// Per-URL sorted sets held in process memory.
#[derive(Clone)]
pub struct MemoryCache {
    sets: Cache<String, SharedSet>,
}

impl MemoryCache {
    pub fn new(ttl: Duration) -> Self {
        Self { sets: Cache::builder().time_to_live(ttl).build() }
    }

    /// Number of live entries cached for `url`.
    pub async fn entries(&self, url: &str) -> usize {
        match self.sets.get(url).await {
            Some(set) => set.read().await.members.len(),
            None => 0,
        }
    }

    /// Number of URLs with a live set, after pending evictions have run.
    pub async fn live_sets(&self) -> u64 {
        self.sets.run_pending_tasks().await;
        self.sets.entry_count()
    }

    /// Drop every cached set.
    pub fn clear(&self) {
        self.sets.invalidate_all();
    }

    /// Append `docs` to the set for `url` under moka's per-key lock.
    ///
    /// A missing set is created only when `create` is set. Writing the set
    /// back restarts its time-to-live. Returns whether anything was written.
    async fn append(&self, url: &str, docs: &[Document], create: bool) -> bool {
        let outcome = self
            .sets
            .entry(url.to_string())
            .and_compute_with(|current| async move {
                let set = match current {
                    Some(entry) => entry.into_value(),
                    None if create => SharedSet::default(),
                    None => return Op::Nop,
                };
                {
                    let mut members = set.write().await;
                    for doc in docs {
                        members.push(doc);
                    }
                }
                Op::Put(set)
            })
            .await;

        match outcome {
            CompResult::Inserted(_) | CompResult::ReplacedWith(_) => {
                tracing::debug!(url, added = docs.len(), "cached documents");
                true
            }
            _ => false,
        }
    }

    async fn lookup(&self, url: &str, bound: Bound) -> Result<Document, Error> {
        let set = self.sets.get(url).await.ok_or_else(|| Error::CacheMiss(url.to_string()))?;
        let members = set.read().await;
        members.bound(bound).cloned().ok_or_else(|| Error::CacheMiss(url.to_string()))
    }
}

#[async_trait]
impl ObservationStore for MemoryCache {
    fn name(&self) -> &'static str {
        "memory-cache"
    }

    async fn add(&self, doc: &Document) -> Result<(), Error> {
        self.append(&doc.url, std::slice::from_ref(doc), true).await;
        Ok(())
    }

    async fn add_if_live(&self, doc: &Document) -> Result<bool, Error> {
        Ok(self.append(&doc.url, std::slice::from_ref(doc), false).await)
    }

    async fn seed(&self, docs: &[Document]) -> Result<(), Error> {
        if let Some(first) = docs.first() {
            self.append(&first.url, docs, true).await;
        }
        Ok(())
    }

    async fn invalidate(&self, url: &str) -> Result<(), Error> {
        self.sets.invalidate(url).await;
        tracing::debug!(url, "invalidated cache set");
        Ok(())
    }

    async fn get_by_fetch_time_min(&self, url: &str) -> Result<Document, Error> {
        self.lookup(url, Bound::Min).await
    }

    async fn get_by_fetch_time_max(&self, url: &str) -> Result<Document, Error> {
        self.lookup(url, Bound::Max).await
    }
}
