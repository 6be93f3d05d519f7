// ============================================================================
// Notification Router
// ============================================================================
//
// Decides, per notification, between immediate delivery to the node holding
// the device's connection and durable storage for later retrieval.
//
// Flow:
// 1. Preflight: verify the optional push receipt, then confirm the channel
//    belongs to the device. Receipt verification always completes first so an
//    invalid receipt never reveals whether a subscription exists.
// 2. If a live node is known (and not recently dead), deliver to it.
//    - Success: done, 201 + Location
//    - Any transport failure: fall through to storage
// 3. Store the notification (TTL 0 finishes routing without storing).
// 4. Re-check the node: the device may have connected while we stored.
//    - Node answers: ask it to fetch stored messages
//    - Otherwise: message waits in storage
//
// Delivered and stored responses share one shape.
//
// ============================================================================

use crate::dead_nodes::DeadNodeCache;
use crate::error::{RoutingError, RoutingResult};
use crate::metrics::{
    BROADCAST_HIT_TOTAL, BROADCAST_MISS_TOTAL, BROADCAST_SAVE_HIT_TOTAL, CLIENT_HOST_GONE_TOTAL,
    ROUTING_ERRORS_TOTAL,
};
use crate::notification::Notification;
use crate::receipt::{verify_receipt, ReceiptCodec};
use crate::registry::{ensure_channel, validate_channel, NodeDirectory, SubscriptionRegistry};
use crate::response::{RouterResponse, LOCATION};
use crate::storage::{save_notification, MessageStore};
use crate::strategy::{DeliveryStrategy, WebPush};
use crate::transport::{DispatchError, NodeTransport};
use crate::utils::{log_safe_id, now_epoch_secs};
use axum::http::StatusCode;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// External systems the router talks to
#[derive(Clone)]
pub struct RouterBackends {
    pub receipts: Arc<dyn ReceiptCodec>,
    pub registry: Arc<dyn SubscriptionRegistry>,
    pub nodes: Arc<dyn NodeDirectory>,
    pub transport: Arc<dyn NodeTransport>,
    pub store: Arc<dyn MessageStore>,
}

/// Generic deliver-or-store pipeline
pub struct Router<S: DeliveryStrategy = WebPush> {
    strategy: S,
    backends: RouterBackends,
    dead_nodes: Arc<DeadNodeCache>,
    log_salt: String,
    clock: fn() -> i64,
}

pub type WebPushRouter = Router<WebPush>;

impl WebPushRouter {
    pub fn web_push(backends: RouterBackends) -> Self {
        Router::new(WebPush, backends)
    }
}

impl<S: DeliveryStrategy> Router<S> {
    pub fn new(strategy: S, backends: RouterBackends) -> Self {
        Self {
            strategy,
            backends,
            dead_nodes: Arc::new(DeadNodeCache::default()),
            log_salt: String::new(),
            clock: now_epoch_secs,
        }
    }

    /// Share a dead-node cache across routers
    pub fn with_dead_nodes(mut self, dead_nodes: Arc<DeadNodeCache>) -> Self {
        self.dead_nodes = dead_nodes;
        self
    }

    pub fn with_log_salt(mut self, salt: impl Into<String>) -> Self {
        self.log_salt = salt.into();
        self
    }

    /// Override the epoch-seconds clock used for expiry
    pub fn with_clock(mut self, clock: fn() -> i64) -> Self {
        self.clock = clock;
        self
    }

    pub fn backends(&self) -> &RouterBackends {
        &self.backends
    }

    /// Route a notification to a live node or into storage.
    ///
    /// `receipt` is the raw `push-receipt` value (empty when none was
    /// requested). `endpoint_base` prefixes the returned `Location`.
    pub async fn route(
        &self,
        uaid: &str,
        notification: Notification,
        receipt: &str,
        endpoint_base: &str,
    ) -> RoutingResult<RouterResponse> {
        let result = self
            .route_notification(uaid, notification, receipt, endpoint_base)
            .await;

        if let Err(e) = &result {
            if e.should_log() {
                ROUTING_ERRORS_TOTAL.inc();
            }
        }

        result
    }

    /// Issue a receipt endpoint for one of the device's channels.
    ///
    /// The endpoint travels back in the `Location` header of a 201.
    pub async fn issue_receipt(&self, uaid: &str, channel_id: &str) -> RoutingResult<RouterResponse> {
        ensure_channel(self.backends.registry.as_ref(), uaid, channel_id).await?;

        let receipt_id = Uuid::new_v4().simple().to_string();
        let endpoint = self
            .backends
            .receipts
            .make_receipt_endpoint(uaid, channel_id, &receipt_id);

        info!(
            uaid_hash = %log_safe_id(uaid, &self.log_salt),
            receipt_id = %receipt_id,
            "Receipt endpoint issued"
        );

        Ok(RouterResponse::new(StatusCode::CREATED, "").with_header(LOCATION, endpoint))
    }

    /// Drop a stored message that has not been retrieved yet
    pub async fn delete_message(&self, message_id: &str) -> RoutingResult<()> {
        let removed = self
            .backends
            .store
            .delete_message(message_id)
            .await
            .map_err(|e| RoutingError::storage(&e))?;

        debug!(message_id = %message_id, removed, "Stored message delete requested");
        Ok(())
    }

    /// Receipt verification, then channel ownership
    pub async fn preflight_check(
        &self,
        uaid: &str,
        notification: Notification,
        receipt: &str,
    ) -> RoutingResult<Notification> {
        let notification =
            verify_receipt(self.backends.receipts.clone(), uaid, notification, receipt).await?;

        validate_channel(self.backends.registry.as_ref(), uaid, notification).await
    }

    async fn route_notification(
        &self,
        uaid: &str,
        notification: Notification,
        receipt: &str,
        endpoint_base: &str,
    ) -> RoutingResult<RouterResponse> {
        let notification = self.preflight_check(uaid, notification, receipt).await?;
        let now = (self.clock)();
        let uaid_hash = log_safe_id(uaid, &self.log_salt);

        if let Some(node) = self.current_node(uaid, now).await {
            let payload = self.strategy.build_payload(&notification, now)?;

            match self
                .backends
                .transport
                .put_notification(&node, uaid, &payload)
                .await
            {
                Ok(()) => {
                    BROADCAST_HIT_TOTAL.inc();
                    info!(
                        uaid_hash = %uaid_hash,
                        version = %notification.version,
                        "Notification delivered to live node"
                    );
                    return Ok(self.strategy.delivered_response(endpoint_base, &notification));
                }
                Err(e) => {
                    debug!(
                        uaid_hash = %uaid_hash,
                        error = %e,
                        "Direct delivery failed, storing notification"
                    );
                    self.handle_node_failure(uaid, &node, &e, now).await;
                }
            }
        }

        save_notification(
            &self.strategy,
            self.backends.store.as_ref(),
            uaid,
            &notification,
            now,
        )
        .await?;

        Ok(self
            .check_after_store(uaid, &uaid_hash, &notification, endpoint_base, now)
            .await)
    }

    /// The node holding the device's connection, skipping recently dead nodes.
    ///
    /// A failed lookup counts as "no node": the notification is stored.
    async fn current_node(&self, uaid: &str, now: i64) -> Option<String> {
        let node = match self.backends.nodes.live_node(uaid).await {
            Ok(node) => node?,
            Err(e) => {
                debug!(error = %format!("{:#}", e), "Node lookup failed");
                return None;
            }
        };

        if self.dead_nodes.is_dead(&node, now).await {
            debug!(node = %node, "Skipping node marked dead");
            return None;
        }

        Some(node)
    }

    async fn handle_node_failure(&self, uaid: &str, node: &str, err: &DispatchError, now: i64) {
        if !err.node_gone() {
            return;
        }

        CLIENT_HOST_GONE_TOTAL.inc();
        self.dead_nodes.mark_dead(node, now).await;

        if let Err(e) = self.backends.nodes.clear_node(uaid, node).await {
            debug!(node = %node, error = %format!("{:#}", e), "Failed to clear node entry");
        }
    }

    async fn check_after_store(
        &self,
        uaid: &str,
        uaid_hash: &str,
        notification: &Notification,
        endpoint_base: &str,
        now: i64,
    ) -> RouterResponse {
        let Some(node) = self.current_node(uaid, now).await else {
            BROADCAST_MISS_TOTAL.inc();
            info!(
                uaid_hash = %uaid_hash,
                version = %notification.version,
                "Router miss, notification stored"
            );
            return self.strategy.stored_response(endpoint_base, notification);
        };

        match self.backends.transport.check_notifications(&node, uaid).await {
            Ok(()) => {
                BROADCAST_SAVE_HIT_TOTAL.inc();
                info!(
                    uaid_hash = %uaid_hash,
                    version = %notification.version,
                    "Notification stored, node notified"
                );
                self.strategy.delivered_response(endpoint_base, notification)
            }
            Err(e) => {
                self.handle_node_failure(uaid, &node, &e, now).await;
                BROADCAST_MISS_TOTAL.inc();
                info!(
                    uaid_hash = %uaid_hash,
                    version = %notification.version,
                    error = %e,
                    "Router miss, notification stored"
                );
                self.strategy.stored_response(endpoint_base, notification)
            }
        }
    }
}
