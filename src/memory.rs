//! In-process registry, node directory and message store.
//!
//! Backs the test suites; failure switches let tests take any part offline.

use crate::registry::{NodeDirectory, SubscriptionRegistry};
use crate::storage::{MessageStore, StoredMessage};
use anyhow::Result;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::RwLock;

#[derive(Default)]
pub struct MemoryBackend {
    channels: RwLock<HashMap<String, HashSet<String>>>,
    nodes: RwLock<HashMap<String, String>>,
    messages: RwLock<Vec<StoredMessage>>,
    registry_lookups: AtomicUsize,
    store_calls: AtomicUsize,
    fail_registry: AtomicBool,
    fail_nodes: AtomicBool,
    fail_store: AtomicBool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register_channel(&self, uaid: &str, channel_id: &str) {
        self.channels
            .write()
            .await
            .entry(uaid.to_string())
            .or_default()
            .insert(channel_id.to_string());
    }

    pub async fn unregister_channel(&self, uaid: &str, channel_id: &str) -> bool {
        self.channels
            .write()
            .await
            .get_mut(uaid)
            .is_some_and(|chids| chids.remove(channel_id))
    }

    pub async fn set_node(&self, uaid: &str, node: &str) {
        self.nodes
            .write()
            .await
            .insert(uaid.to_string(), node.to_string());
    }

    /// Messages stored for a device, oldest first
    pub async fn messages_for(&self, uaid: &str) -> Vec<StoredMessage> {
        self.messages
            .read()
            .await
            .iter()
            .filter(|m| m.uaid == uaid)
            .cloned()
            .collect()
    }

    pub fn registry_lookups(&self) -> usize {
        self.registry_lookups.load(Ordering::SeqCst)
    }

    pub fn store_calls(&self) -> usize {
        self.store_calls.load(Ordering::SeqCst)
    }

    /// Make subsequent registry lookups fail
    pub fn fail_registry(&self, fail: bool) {
        self.fail_registry.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent node directory calls fail
    pub fn fail_nodes(&self, fail: bool) {
        self.fail_nodes.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent store calls fail
    pub fn fail_store(&self, fail: bool) {
        self.fail_store.store(fail, Ordering::SeqCst);
    }

    fn check_nodes(&self) -> Result<()> {
        if self.fail_nodes.load(Ordering::SeqCst) {
            anyhow::bail!("node directory unavailable");
        }
        Ok(())
    }

    fn check_store(&self) -> Result<()> {
        if self.fail_store.load(Ordering::SeqCst) {
            anyhow::bail!("store unavailable");
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl SubscriptionRegistry for MemoryBackend {
    async fn all_channels(&self, uaid: &str) -> Result<HashSet<String>> {
        self.registry_lookups.fetch_add(1, Ordering::SeqCst);
        if self.fail_registry.load(Ordering::SeqCst) {
            anyhow::bail!("registry unavailable");
        }

        Ok(self
            .channels
            .read()
            .await
            .get(uaid)
            .cloned()
            .unwrap_or_default())
    }
}

#[async_trait::async_trait]
impl NodeDirectory for MemoryBackend {
    async fn live_node(&self, uaid: &str) -> Result<Option<String>> {
        self.check_nodes()?;
        Ok(self.nodes.read().await.get(uaid).cloned())
    }

    async fn clear_node(&self, uaid: &str, node: &str) -> Result<bool> {
        self.check_nodes()?;
        let mut nodes = self.nodes.write().await;
        if nodes.get(uaid).map(String::as_str) == Some(node) {
            nodes.remove(uaid);
            return Ok(true);
        }
        Ok(false)
    }

    async fn ping(&self) -> Result<()> {
        self.check_nodes()
    }
}

#[async_trait::async_trait]
impl MessageStore for MemoryBackend {
    async fn store_message(&self, message: &StoredMessage) -> Result<()> {
        self.store_calls.fetch_add(1, Ordering::SeqCst);
        self.check_store()?;

        self.messages.write().await.push(message.clone());
        Ok(())
    }

    async fn delete_message(&self, message_id: &str) -> Result<bool> {
        self.check_store()?;

        let mut messages = self.messages.write().await;
        let before = messages.len();
        messages.retain(|m| m.message_id != message_id);
        Ok(messages.len() < before)
    }

    async fn ping(&self) -> Result<()> {
        self.check_store()
    }
}
