use crate::config::SECONDS_PER_HOUR;
use lru::LruCache;
use std::num::NonZeroUsize;
use tokio::sync::Mutex;

pub const DEFAULT_DEAD_NODE_CACHE_SIZE: usize = 150;

/// Cache key: the node address bucketed by hour, so a node marked dead is
/// retried once the hour rolls over.
pub fn node_key(node: &str, now: i64) -> String {
    format!("{}-{}", node, now.div_euclid(SECONDS_PER_HOUR))
}

/// Bounded set of nodes that recently failed to accept a connection.
///
/// Least recently marked entries are evicted once full.
pub struct DeadNodeCache {
    inner: Mutex<LruCache<String, ()>>,
}

impl DeadNodeCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub async fn mark_dead(&self, node: &str, now: i64) {
        self.inner.lock().await.put(node_key(node, now), ());
    }

    pub async fn is_dead(&self, node: &str, now: i64) -> bool {
        self.inner.lock().await.contains(&node_key(node, now))
    }
}

impl Default for DeadNodeCache {
    fn default() -> Self {
        Self::new(DEFAULT_DEAD_NODE_CACHE_SIZE)
    }
}
