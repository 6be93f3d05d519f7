use crate::error::RoutingError;
use crate::notification::{CryptoHeaders, Notification};
use crate::strategy::DeliveryStrategy;
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// One message persisted for later retrieval by the device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredMessage {
    pub uaid: String,
    pub channel_id: String,
    /// The notification version, including any receipt suffix
    pub message_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<CryptoHeaders>,
    /// Absolute expiry, epoch seconds
    pub expiry: i64,
}

/// Durable message store
///
/// Implementations must be safe for concurrent use; the router shares one
/// instance across all in-flight requests.
#[async_trait::async_trait]
pub trait MessageStore: Send + Sync {
    async fn store_message(&self, message: &StoredMessage) -> Result<()>;

    /// Drop a pending message. Returns whether it was still stored.
    async fn delete_message(&self, message_id: &str) -> Result<bool>;

    /// Round-trip to the backing store, for health checks
    async fn ping(&self) -> Result<()>;
}

/// Build the record stored for a notification arriving at `now`.
///
/// A zero TTL has already lapsed: nothing is built and routing finishes.
pub fn stored_message_for<S: DeliveryStrategy + ?Sized>(
    strategy: &S,
    uaid: &str,
    notification: &Notification,
    now: i64,
) -> Result<StoredMessage, RoutingError> {
    if notification.ttl == 0 {
        return Err(RoutingError::FinishedRouting);
    }

    let headers = strategy.assemble_metadata(notification)?;
    let data = notification.data.clone().filter(|d| !d.is_empty());

    Ok(StoredMessage {
        uaid: uaid.to_string(),
        channel_id: notification.channel_id.clone(),
        message_id: notification.version.clone(),
        data,
        headers,
        expiry: notification.expiry_at(now),
    })
}

/// Persist a notification, honoring the zero-TTL terminal case
pub async fn save_notification<S: DeliveryStrategy + ?Sized>(
    strategy: &S,
    store: &dyn MessageStore,
    uaid: &str,
    notification: &Notification,
    now: i64,
) -> Result<(), RoutingError> {
    let message = stored_message_for(strategy, uaid, notification, now)?;

    store
        .store_message(&message)
        .await
        .map_err(|e| RoutingError::storage(&e))
}
