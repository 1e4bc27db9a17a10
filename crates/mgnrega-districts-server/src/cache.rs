use redis::AsyncCommands;
use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::warn;

#[derive(Debug)]
pub struct CacheError(pub String);

impl Display for CacheError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
impl std::error::Error for CacheError {}

#[derive(Clone)]
struct HotEntry {
    body: Vec<u8>,
    created_at: Instant,
}

/// Fixed-TTL map of serialized response bodies; oldest entry is evicted
/// when full.
struct HotResponseCache {
    ttl: Duration,
    max_entries: usize,
    entries: HashMap<String, HotEntry>,
}

impl HotResponseCache {
    fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            ttl,
            max_entries,
            entries: HashMap::new(),
        }
    }

    fn get(&mut self, key: &str) -> Option<Vec<u8>> {
        self.entries
            .retain(|_, v| v.created_at.elapsed() <= self.ttl);
        self.entries.get(key).map(|v| v.body.clone())
    }

    fn insert(&mut self, key: String, body: Vec<u8>) {
        self.entries
            .retain(|_, v| v.created_at.elapsed() <= self.ttl);
        if self.entries.len() >= self.max_entries {
            if let Some(victim) = self
                .entries
                .iter()
                .min_by_key(|(_, v)| v.created_at)
                .map(|(k, _)| k.clone())
            {
                self.entries.remove(&victim);
            }
        }
        self.entries.insert(
            key,
            HotEntry {
                body,
                created_at: Instant::now(),
            },
        );
    }
}

struct RedisTier {
    client: redis::Client,
    prefix: String,
    timeout: Duration,
}

impl RedisTier {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let full_key = format!("{}:{key}", self.prefix);
        let mut conn = timeout(self.timeout, self.client.get_multiplexed_async_connection())
            .await
            .map_err(|_| CacheError("redis connect timeout".to_string()))?
            .map_err(|e| CacheError(e.to_string()))?;
        timeout(self.timeout, conn.get::<_, Option<Vec<u8>>>(full_key))
            .await
            .map_err(|_| CacheError("redis get timeout".to_string()))?
            .map_err(|e| CacheError(e.to_string()))
    }

    async fn set(&self, key: &str, body: &[u8], ttl: Duration) -> Result<(), CacheError> {
        let full_key = format!("{}:{key}", self.prefix);
        let mut conn = timeout(self.timeout, self.client.get_multiplexed_async_connection())
            .await
            .map_err(|_| CacheError("redis connect timeout".to_string()))?
            .map_err(|e| CacheError(e.to_string()))?;
        timeout(
            self.timeout,
            conn.set_ex::<_, _, ()>(full_key, body, ttl.as_secs()),
        )
        .await
        .map_err(|_| CacheError("redis set timeout".to_string()))?
        .map_err(|e| CacheError(e.to_string()))
    }
}

/// Response cache for the read endpoints: in-memory TTL map, with Redis in
/// front when configured. Redis failures fall back to the memory tier and
/// never fail a request.
pub struct ResponseCache {
    ttl: Duration,
    hot: Mutex<HotResponseCache>,
    redis: Option<RedisTier>,
}

impl ResponseCache {
    #[must_use]
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            ttl,
            hot: Mutex::new(HotResponseCache::new(ttl, max_entries)),
            redis: None,
        }
    }

    pub fn with_redis(
        ttl: Duration,
        max_entries: usize,
        url: &str,
        prefix: &str,
        redis_timeout: Duration,
    ) -> Result<Self, CacheError> {
        let client = redis::Client::open(url).map_err(|e| CacheError(e.to_string()))?;
        Ok(Self {
            ttl,
            hot: Mutex::new(HotResponseCache::new(ttl, max_entries)),
            redis: Some(RedisTier {
                client,
                prefix: prefix.to_string(),
                timeout: redis_timeout,
            }),
        })
    }

    pub async fn get(&self, key: &str) -> Option<Vec<u8>> {
        if let Some(redis) = &self.redis {
            match redis.get(key).await {
                Ok(hit @ Some(_)) => return hit,
                Ok(None) => {}
                Err(e) => warn!(error = %e, "redis read failed; falling back to memory cache"),
            }
        }
        self.hot.lock().await.get(key)
    }

    pub async fn set(&self, key: &str, body: Vec<u8>) {
        if let Some(redis) = &self.redis {
            if let Err(e) = redis.set(key, &body, self.ttl).await {
                warn!(error = %e, "redis write failed; keeping memory cache only");
            }
        }
        self.hot.lock().await.insert(key.to_string(), body);
    }
}
