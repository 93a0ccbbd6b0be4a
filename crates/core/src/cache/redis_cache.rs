//! Redis sorted-set cache.
//!
//! Observations for a URL live in one sorted set scored by fetch time. A
//! companion counter key hands out the insertion sequence embedded in each
//! member (see [`codec`](super::codec)). Both keys share the configured TTL,
//! refreshed on every write.
//!
//! Every write goes through one Lua script, so the liveness check, the
//! sequence increments, the inserts and both expiries apply atomically.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::{ConnectionLike, ConnectionManager};
use redis::{AsyncCommands, ConnectionAddr, ConnectionInfo, RedisConnectionInfo, Script};

use super::codec::{decode_member, encode_body};
use crate::config::CacheConfig;
use crate::observations::{Bound, ObservationStore};
use crate::{Document, Error};

/// KEYS: sorted set, sequence counter.
/// ARGV: ttl seconds, `1` to require a live set, then score/body pairs.
/// Returns 1 when the members were written, 0 when the set was not live.
const APPEND_SCRIPT: &str = r"
local live = redis.call('EXISTS', KEYS[1]) == 1
if ARGV[2] == '1' and not live then
  return 0
end
for i = 3, #ARGV, 2 do
  local seq = redis.call('INCR', KEYS[2])
  redis.call('ZADD', KEYS[1], ARGV[i], string.format('%020d', seq) .. '|' .. ARGV[i + 1])
end
redis.call('EXPIRE', KEYS[1], ARGV[1])
redis.call('EXPIRE', KEYS[2], ARGV[1])
return 1
";

/// Sorted-set cache over a shared Redis connection.
#[derive(Clone)]
pub struct RedisCache<C = ConnectionManager> {
    conn: C,
    append: Script,
    ttl_secs: i64,
    key_prefix: String,
}

fn set_key(prefix: &str, url: &str) -> String {
    format!("{prefix}doc:{url}")
}

fn seq_key(prefix: &str, url: &str) -> String {
    format!("{prefix}seq:{url}")
}

fn ttl_secs(ttl: Duration) -> i64 {
    i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX).max(1)
}

impl RedisCache {
    /// Connect to the Redis server described by `config`.
    pub async fn connect(config: &CacheConfig) -> Result<Self, Error> {
        let info = ConnectionInfo {
            addr: ConnectionAddr::Tcp(config.host.clone(), config.port),
            redis: RedisConnectionInfo {
                db: config.database,
                password: config.password.clone(),
                ..Default::default()
            },
        };
        let client = redis::Client::open(info).map_err(|e| Error::Cache(e.to_string()))?;

        tracing::debug!(host = %config.host, port = config.port, db = config.database, "connecting to redis");
        let conn = tokio::time::timeout(config.connect_timeout(), ConnectionManager::new(client))
            .await
            .map_err(|_| {
                Error::Timeout(format!(
                    "connecting to redis at {}:{} took longer than {}s",
                    config.host, config.port, config.connect_timeout_secs
                ))
            })?
            .map_err(|e| Error::Cache(e.to_string()))?;

        Ok(Self::new(conn, config.ttl(), config.key_prefix.clone()))
    }
}

impl<C> RedisCache<C>
where
    C: ConnectionLike + Clone + Send + Sync,
{
    pub fn new(conn: C, ttl: Duration, key_prefix: String) -> Self {
        Self { conn, append: Script::new(APPEND_SCRIPT), ttl_secs: ttl_secs(ttl), key_prefix }
    }

    /// Run the append script for `docs`, all of which share `url`.
    async fn append(&self, url: &str, docs: &[Document], only_live: bool) -> Result<bool, Error> {
        let mut invocation = self.append.prepare_invoke();
        invocation
            .key(set_key(&self.key_prefix, url))
            .key(seq_key(&self.key_prefix, url))
            .arg(self.ttl_secs)
            .arg(only_live);
        for doc in docs {
            invocation.arg(doc.fetch_time).arg(encode_body(doc)?);
        }

        let mut conn = self.conn.clone();
        let written: i64 = invocation
            .invoke_async(&mut conn)
            .await
            .map_err(|e| Error::CacheWrite(format!("redis append for {url}: {e}")))?;

        tracing::debug!(url, added = docs.len(), written = written == 1, "redis append");
        Ok(written == 1)
    }

    async fn lookup(&self, url: &str, bound: Bound) -> Result<Document, Error> {
        let key = set_key(&self.key_prefix, url);
        let mut conn = self.conn.clone();

        let result: redis::RedisResult<Vec<(String, f64)>> = match bound {
            Bound::Min => conn.zrange_withscores(&key, 0, 0).await,
            Bound::Max => conn.zrevrange_withscores(&key, 0, 0).await,
        };
        let members = result.map_err(|e| Error::Read(format!("redis {} lookup for {url}: {e}", bound.as_str())))?;

        match members.into_iter().next() {
            Some((member, _score)) => decode_member(&member),
            None => Err(Error::CacheMiss(url.to_string())),
        }
    }
}

#[async_trait]
impl<C> ObservationStore for RedisCache<C>
where
    C: ConnectionLike + Clone + Send + Sync,
{
    fn name(&self) -> &'static str {
        "redis-cache"
    }

    async fn add(&self, doc: &Document) -> Result<(), Error> {
        self.append(&doc.url, std::slice::from_ref(doc), false).await.map(|_| ())
    }

    async fn add_if_live(&self, doc: &Document) -> Result<bool, Error> {
        self.append(&doc.url, std::slice::from_ref(doc), true).await
    }

    async fn seed(&self, docs: &[Document]) -> Result<(), Error> {
        match docs.first() {
            Some(first) => self.append(&first.url, docs, false).await.map(|_| ()),
            None => Ok(()),
        }
    }

    async fn invalidate(&self, url: &str) -> Result<(), Error> {
        let mut conn = self.conn.clone();
        let _: () = conn
            .del(vec![set_key(&self.key_prefix, url), seq_key(&self.key_prefix, url)])
            .await
            .map_err(|e| Error::CacheWrite(format!("redis invalidate for {url}: {e}")))?;
        Ok(())
    }

    async fn get_by_fetch_time_min(&self, url: &str) -> Result<Document, Error> {
        self.lookup(url, Bound::Min).await
    }

    async fn get_by_fetch_time_max(&self, url: &str) -> Result<Document, Error> {
        self.lookup(url, Bound::Max).await
    }
}
