use crate::error::RoutingError;
use crate::notification::Notification;
use anyhow::Result;
use std::collections::HashSet;

/// Channel ownership lookup
#[async_trait::async_trait]
pub trait SubscriptionRegistry: Send + Sync {
    /// All channel ids currently registered for a device
    async fn all_channels(&self, uaid: &str) -> Result<HashSet<String>>;
}

/// Tracks which node, if any, currently holds a device's connection
#[async_trait::async_trait]
pub trait NodeDirectory: Send + Sync {
    /// Address of the node holding the device's connection
    async fn live_node(&self, uaid: &str) -> Result<Option<String>>;

    /// Forget the node for a device, but only if the entry still names
    /// `node`. Returns whether an entry was removed.
    async fn clear_node(&self, uaid: &str, node: &str) -> Result<bool>;

    /// Round-trip to the backing store, for health checks
    async fn ping(&self) -> Result<()>;
}

/// Confirm `channel_id` is registered to `uaid`
pub async fn ensure_channel(
    registry: &dyn SubscriptionRegistry,
    uaid: &str,
    channel_id: &str,
) -> Result<(), RoutingError> {
    let channels = registry
        .all_channels(uaid)
        .await
        .map_err(|e| RoutingError::registry(&e))?;

    if !channels.contains(channel_id) {
        return Err(RoutingError::NoSuchSubscription);
    }

    Ok(())
}

/// Confirm the notification's channel is registered to `uaid`
pub async fn validate_channel(
    registry: &dyn SubscriptionRegistry,
    uaid: &str,
    notification: Notification,
) -> Result<Notification, RoutingError> {
    ensure_channel(registry, uaid, &notification.channel_id).await?;
    Ok(notification)
}
