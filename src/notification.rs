// ============================================================================
// Notification Model
// ============================================================================
//
// A Notification is the parsed form of one push request. It is built once at
// the request boundary, optionally replaced once during preflight (receipt
// augmentation), and consumed exactly once by either delivery or storage.
//
// Header keys are lowercased on construction so lookups never depend on the
// casing the application server used.
//
// ============================================================================

use crate::error::RoutingError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const HEADER_CONTENT_ENCODING: &str = "content-encoding";
pub const HEADER_ENCRYPTION: &str = "encryption";
pub const HEADER_ENCRYPTION_KEY: &str = "encryption-key";
pub const HEADER_PUSH_RECEIPT: &str = "push-receipt";
pub const HEADER_TTL: &str = "ttl";

/// Longest accepted TTL (60 days); larger requests are clamped
pub const MAX_TTL_SECS: u64 = 60 * 24 * 60 * 60;

/// Headers that must accompany a non-empty payload
pub const REQUIRED_CRYPTO_HEADERS: [&str; 2] = [HEADER_CONTENT_ENCODING, HEADER_ENCRYPTION];

/// One message to route to a device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub channel_id: String,
    /// Server-issued message id. Becomes `<version>:<receipt_id>` after
    /// receipt augmentation.
    pub version: String,
    /// Encrypted payload (base64url). `None` for wake-up pings.
    pub data: Option<String>,
    pub headers: HashMap<String, String>,
    /// Seconds from arrival, at most `MAX_TTL_SECS`. Zero means nothing is
    /// left to store.
    pub ttl: u64,
    receipt_id: Option<String>,
}

impl Notification {
    pub fn new<I, K, V>(
        channel_id: impl Into<String>,
        version: impl Into<String>,
        data: Option<String>,
        headers: I,
        ttl: u64,
    ) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let headers = headers
            .into_iter()
            .map(|(k, v)| (k.as_ref().to_ascii_lowercase(), v.into()))
            .collect();

        Self {
            channel_id: channel_id.into(),
            version: version.into(),
            data,
            headers,
            ttl: ttl.min(MAX_TTL_SECS),
            receipt_id: None,
        }
    }

    /// True when the notification carries a payload
    pub fn has_data(&self) -> bool {
        self.data.as_deref().is_some_and(|d| !d.is_empty())
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    /// Receipt id appended to the version, if any
    pub fn receipt_id(&self) -> Option<&str> {
        self.receipt_id.as_deref()
    }

    /// Returns a copy whose version has the receipt id appended.
    ///
    /// A notification that was already augmented is returned unchanged, so
    /// the version never carries more than one receipt suffix.
    pub fn with_receipt(&self, receipt_id: &str) -> Self {
        if self.receipt_id.is_some() {
            return self.clone();
        }

        Self {
            channel_id: self.channel_id.clone(),
            version: format!("{}:{}", self.version, receipt_id),
            data: self.data.clone(),
            headers: self.headers.clone(),
            ttl: self.ttl,
            receipt_id: Some(receipt_id.to_string()),
        }
    }

    /// Absolute expiry in epoch seconds for a notification arriving at `now`
    pub fn expiry_at(&self, now: i64) -> i64 {
        now.saturating_add(self.ttl.min(MAX_TTL_SECS) as i64)
    }
}

/// Encryption metadata forwarded alongside a payload.
///
/// `encryption_key` is omitted rather than set to an empty string; some
/// stores reject empty attribute values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CryptoHeaders {
    pub encoding: String,
    pub encryption: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encryption_key: Option<String>,
}

impl CryptoHeaders {
    /// Assemble the crypto metadata from a notification's headers.
    ///
    /// Only meaningful when the notification has data.
    pub fn from_notification(notification: &Notification) -> Result<Self, RoutingError> {
        let required = |name: &'static str| {
            notification
                .header(name)
                .map(str::to_string)
                .ok_or(RoutingError::MalformedCryptoHeaders { missing: name })
        };

        Ok(Self {
            encoding: required(HEADER_CONTENT_ENCODING)?,
            encryption: required(HEADER_ENCRYPTION)?,
            encryption_key: notification
                .header(HEADER_ENCRYPTION_KEY)
                .filter(|v| !v.is_empty())
                .map(str::to_string),
        })
    }
}
