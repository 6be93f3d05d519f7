// ============================================================================
// Node Transport
// ============================================================================
//
// Delivers notifications to the node holding a device's connection:
//   PUT <node>/push/<uaid>   JSON payload, delivered immediately
//   PUT <node>/notif/<uaid>  no body, asks the node to fetch stored messages
//
// Transport failures are never retried here. The router treats them as
// "no live node" and stores the notification instead.
//
// ============================================================================

use crate::notification::{CryptoHeaders, Notification};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Node unreachable: {0}")]
    Connect(String),

    #[error("Node timed out")]
    Timeout,

    #[error("Node rejected notification: HTTP {0}")]
    Status(u16),

    #[error("Failed to encode payload: {0}")]
    Encode(String),
}

impl DispatchError {
    /// True when the node itself looks gone, not just busy
    pub fn node_gone(&self) -> bool {
        matches!(self, DispatchError::Connect(_) | DispatchError::Timeout)
    }
}

impl From<reqwest::Error> for DispatchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            DispatchError::Timeout
        } else if let Some(status) = err.status() {
            DispatchError::Status(status.as_u16())
        } else {
            DispatchError::Connect(err.to_string())
        }
    }
}

/// Body of a direct delivery
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryPayload {
    #[serde(rename = "channelID")]
    pub channel_id: String,
    pub version: String,
    /// Absolute expiry, epoch seconds
    pub ttl: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<CryptoHeaders>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

impl DeliveryPayload {
    /// Build the payload for a notification arriving at `now`.
    ///
    /// `headers` is the assembled crypto metadata; data travels only with it.
    pub fn new(notification: &Notification, headers: Option<CryptoHeaders>, now: i64) -> Self {
        let data = headers
            .as_ref()
            .and(notification.data.clone())
            .filter(|d| !d.is_empty());

        Self {
            channel_id: notification.channel_id.clone(),
            version: notification.version.clone(),
            ttl: notification.expiry_at(now),
            headers,
            data,
        }
    }
}

/// Network writes to connection-holding nodes
#[async_trait::async_trait]
pub trait NodeTransport: Send + Sync {
    /// Deliver a notification; success means the node accepted it
    async fn put_notification(
        &self,
        node: &str,
        uaid: &str,
        payload: &DeliveryPayload,
    ) -> Result<(), DispatchError>;

    /// Ask the node to check storage for the device. `Ok` only when the
    /// node started checking right away.
    async fn check_notifications(&self, node: &str, uaid: &str) -> Result<(), DispatchError>;
}

/// reqwest-backed transport
#[derive(Clone)]
pub struct HttpNodeTransport {
    http_client: reqwest::Client,
}

impl HttpNodeTransport {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http_client })
    }

    fn url(node: &str, kind: &str, uaid: &str) -> String {
        format!("{}/{}/{}", node.trim_end_matches('/'), kind, uaid)
    }
}

#[async_trait::async_trait]
impl NodeTransport for HttpNodeTransport {
    async fn put_notification(
        &self,
        node: &str,
        uaid: &str,
        payload: &DeliveryPayload,
    ) -> Result<(), DispatchError> {
        let body = serde_json::to_vec(payload).map_err(|e| DispatchError::Encode(e.to_string()))?;

        let response = self
            .http_client
            .put(Self::url(node, "push", uaid))
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;

        accepted(response)
    }

    async fn check_notifications(&self, node: &str, uaid: &str) -> Result<(), DispatchError> {
        let response = self
            .http_client
            .put(Self::url(node, "notif", uaid))
            .send()
            .await?;

        accepted(response)
    }
}

/// Only 200 means the node took the message; 202 is "busy, will check
/// later". The body is ignored.
fn accepted(response: reqwest::Response) -> Result<(), DispatchError> {
    match response.status() {
        reqwest::StatusCode::OK => Ok(()),
        status => Err(DispatchError::Status(status.as_u16())),
    }
}
