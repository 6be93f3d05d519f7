// ============================================================================
// Delivery Strategies
// ============================================================================
//
// The deliver-or-store pipeline is generic over a strategy that decides what
// metadata travels with a notification, what a node receives, and how a
// successful outcome is reported to the application server.
//
// ============================================================================

use crate::error::RoutingError;
use crate::notification::{CryptoHeaders, Notification};
use crate::response::{message_location, RouterResponse, LOCATION};
use crate::transport::DeliveryPayload;
use axum::http::StatusCode;

pub trait DeliveryStrategy: Send + Sync {
    /// Metadata stored and delivered alongside the payload
    fn assemble_metadata(
        &self,
        notification: &Notification,
    ) -> Result<Option<CryptoHeaders>, RoutingError>;

    /// Body written to a live node
    fn build_payload(
        &self,
        notification: &Notification,
        now: i64,
    ) -> Result<DeliveryPayload, RoutingError> {
        let headers = self.assemble_metadata(notification)?;
        Ok(DeliveryPayload::new(notification, headers, now))
    }

    fn delivered_response(&self, endpoint_base: &str, notification: &Notification)
        -> RouterResponse;

    fn stored_response(&self, endpoint_base: &str, notification: &Notification) -> RouterResponse;
}

/// Encrypted Web Push messages, stored one record per message
#[derive(Debug, Clone, Copy, Default)]
pub struct WebPush;

impl DeliveryStrategy for WebPush {
    fn assemble_metadata(
        &self,
        notification: &Notification,
    ) -> Result<Option<CryptoHeaders>, RoutingError> {
        if !notification.has_data() {
            return Ok(None);
        }
        CryptoHeaders::from_notification(notification).map(Some)
    }

    fn delivered_response(
        &self,
        endpoint_base: &str,
        notification: &Notification,
    ) -> RouterResponse {
        RouterResponse::new(StatusCode::CREATED, "")
            .with_header(LOCATION, message_location(endpoint_base, &notification.version))
    }

    /// Identical to `delivered_response`: the sender cannot tell a live
    /// delivery from a queued one.
    fn stored_response(&self, endpoint_base: &str, notification: &Notification) -> RouterResponse {
        self.delivered_response(endpoint_base, notification)
    }
}
