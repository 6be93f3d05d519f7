// ============================================================================
// Redis Backend
// ============================================================================
//
// Keys (prefix from REDIS_KEY_PREFIX):
//   {prefix}chids:{uaid}                       SET of channel ids
//   {prefix}node:{uaid}                        node address holding the connection
//   {prefix}msg:{message_id}                   JSON StoredMessage, SET .. EXAT expiry
//   {prefix}msgs:{uaid}                        ZSET of message keys scored by expiry
//
// Index entries outlive deleted messages until their expiry passes; reads
// skip keys that are gone.
//
// ConnectionManager reconnects on its own; each call clones a handle.
//
// ============================================================================

use crate::registry::{NodeDirectory, SubscriptionRegistry};
use crate::storage::{MessageStore, StoredMessage};
use crate::utils::now_epoch_secs;
use anyhow::{Context, Result};
use redis::{aio::ConnectionManager, AsyncCommands};
use std::collections::HashSet;

/// Removes the node entry only if it still names the node that failed
const CLEAR_NODE_SCRIPT: &str = r"
    if redis.call('GET', KEYS[1]) == ARGV[1] then
        return redis.call('DEL', KEYS[1])
    end
    return 0
";

#[derive(Clone)]
pub struct RedisBackend {
    conn: ConnectionManager,
    key_prefix: String,
}

impl RedisBackend {
    /// Connect to Redis server
    ///
    /// Supports both redis:// and rediss:// (TLS) URLs
    pub async fn connect(url: &str, key_prefix: impl Into<String>) -> Result<Self> {
        let client = redis::Client::open(url).context("Invalid REDIS_URL")?;
        let conn = ConnectionManager::new(client)
            .await
            .context("Failed to connect to Redis")?;

        Ok(Self {
            conn,
            key_prefix: key_prefix.into(),
        })
    }

    fn channels_key(&self, uaid: &str) -> String {
        format!("{}chids:{}", self.key_prefix, uaid)
    }

    fn node_key(&self, uaid: &str) -> String {
        format!("{}node:{}", self.key_prefix, uaid)
    }

    fn message_key(&self, message_id: &str) -> String {
        format!("{}msg:{}", self.key_prefix, message_id)
    }

    async fn ping_server(&self) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .context("Redis PING failed")?;
        Ok(())
    }

    fn message_index_key(&self, uaid: &str) -> String {
        format!("{}msgs:{}", self.key_prefix, uaid)
    }

    pub async fn register_channel(&self, uaid: &str, channel_id: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: i64 = conn
            .sadd(self.channels_key(uaid), channel_id)
            .await
            .context("Failed to register channel")?;
        Ok(())
    }

    pub async fn set_node(&self, uaid: &str, node: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn
            .set(self.node_key(uaid), node)
            .await
            .context("Failed to set node")?;
        Ok(())
    }

    /// Stored messages for a device that have not expired yet
    pub async fn fetch_messages(&self, uaid: &str, now: i64) -> Result<Vec<StoredMessage>> {
        let index_key = self.message_index_key(uaid);
        let mut conn = self.conn.clone();

        let _: i64 = conn
            .zrembyscore(&index_key, "-inf", format!("({}", now))
            .await
            .context("Failed to prune message index")?;
        let keys: Vec<String> = conn
            .zrangebyscore(&index_key, now, "+inf")
            .await
            .context("Failed to read message index")?;
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let raw: Vec<Option<String>> = redis::cmd("MGET")
            .arg(&keys)
            .query_async(&mut conn)
            .await
            .context("Failed to read messages")?;

        raw.into_iter()
            .flatten()
            .map(|raw| serde_json::from_str(&raw).context("Corrupt stored message"))
            .collect()
    }
}

#[async_trait::async_trait]
impl SubscriptionRegistry for RedisBackend {
    async fn all_channels(&self, uaid: &str) -> Result<HashSet<String>> {
        let mut conn = self.conn.clone();
        let channels: HashSet<String> = conn
            .smembers(self.channels_key(uaid))
            .await
            .context("Failed to read channels")?;
        Ok(channels)
    }
}

#[async_trait::async_trait]
impl NodeDirectory for RedisBackend {
    async fn live_node(&self, uaid: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        let node: Option<String> = conn
            .get(self.node_key(uaid))
            .await
            .context("Failed to read node entry")?;
        Ok(node.filter(|n| !n.is_empty()))
    }

    async fn clear_node(&self, uaid: &str, node: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        let removed: i64 = redis::Script::new(CLEAR_NODE_SCRIPT)
            .key(self.node_key(uaid))
            .arg(node)
            .invoke_async(&mut conn)
            .await
            .context("Failed to clear node entry")?;
        Ok(removed > 0)
    }

    async fn ping(&self) -> Result<()> {
        self.ping_server().await
    }
}

#[async_trait::async_trait]
impl MessageStore for RedisBackend {
    async fn store_message(&self, message: &StoredMessage) -> Result<()> {
        let key = self.message_key(&message.message_id);
        let index_key = self.message_index_key(&message.uaid);
        let body = serde_json::to_string(message).context("Failed to encode message")?;

        let mut conn = self.conn.clone();
        let _: () = redis::pipe()
            .atomic()
            // Index entries whose message keys have already expired
            .cmd("ZREMRANGEBYSCORE")
            .arg(&index_key)
            .arg("-inf")
            .arg(format!("({}", now_epoch_secs()))
            .ignore()
            .cmd("SET")
            .arg(&key)
            .arg(&body)
            .arg("EXAT")
            .arg(message.expiry)
            .ignore()
            .cmd("ZADD")
            .arg(&index_key)
            .arg(message.expiry)
            .arg(&key)
            .ignore()
            .query_async(&mut conn)
            .await
            .context("Failed to store message")?;

        Ok(())
    }

    async fn delete_message(&self, message_id: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        let removed: i64 = conn
            .del(self.message_key(message_id))
            .await
            .context("Failed to delete message")?;
        Ok(removed > 0)
    }

    async fn ping(&self) -> Result<()> {
        self.ping_server().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    async fn backend() -> RedisBackend {
        let redis_url =
            env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());
        let prefix = format!("test_push:{}:", uuid::Uuid::new_v4().simple());
        RedisBackend::connect(&redis_url, prefix).await.unwrap()
    }

    #[tokio::test]
    #[ignore] // Requires Redis
    async fn test_registry_and_nodes() {
        let backend = backend().await;
        backend.register_channel("u1", "c1").await.unwrap();

        let channels = backend.all_channels("u1").await.unwrap();
        assert!(channels.contains("c1"));

        backend.set_node("u1", "http://n1").await.unwrap();
        assert_eq!(
            backend.live_node("u1").await.unwrap().as_deref(),
            Some("http://n1")
        );
        assert!(!backend.clear_node("u1", "http://n2").await.unwrap());
        assert!(backend.clear_node("u1", "http://n1").await.unwrap());
        assert!(backend.live_node("u1").await.unwrap().is_none());
    }

    #[tokio::test]
    #[ignore] // Requires Redis
    async fn test_store_and_fetch() {
        let backend = backend().await;
        let now = now_epoch_secs();
        let message = StoredMessage {
            uaid: "u1".into(),
            channel_id: "c1".into(),
            message_id: "v1:r1".into(),
            data: None,
            headers: None,
            expiry: now + 60,
        };

        backend.store_message(&message).await.unwrap();

        let fetched = backend.fetch_messages("u1", now).await.unwrap();
        assert_eq!(fetched, vec![message]);

        assert!(backend.delete_message("v1:r1").await.unwrap());
        assert!(!backend.delete_message("v1:r1").await.unwrap());
        assert!(backend.fetch_messages("u1", now).await.unwrap().is_empty());
        assert!(MessageStore::ping(&backend).await.is_ok());
    }

    #[tokio::test]
    #[ignore] // Requires Redis
    async fn test_expired_index_entries_are_pruned() {
        let backend = backend().await;
        let now = now_epoch_secs();
        let message = |id: &str, expiry: i64| StoredMessage {
            uaid: "u1".into(),
            channel_id: "c1".into(),
            message_id: id.into(),
            data: None,
            headers: None,
            expiry,
        };

        backend.store_message(&message("old", now - 10)).await.unwrap();
        backend.store_message(&message("new", now + 60)).await.unwrap();

        let mut conn = backend.conn.clone();
        let indexed: i64 = conn
            .zcard(backend.message_index_key("u1"))
            .await
            .unwrap();
        assert_eq!(indexed, 1);

        let fetched = backend.fetch_messages("u1", now).await.unwrap();
        assert_eq!(fetched, vec![message("new", now + 60)]);
    }
}
