// ============================================================================
// Push Receipts
// ============================================================================
//
// An application server may ask for a delivery receipt by sending the
// receipt endpoint it was issued in the `push-receipt` header. The endpoint
// embeds a tamper-evident token binding (uaid, channel_id, receipt_id).
//
// Token layout:
//   <receipts_url>/r/<base64url("r:<uaid>:<chid>:<receipt_id>")>.<base64url(hmac)>
//
// Verification fails closed: a token that cannot be decoded and a token that
// decodes to another device or channel produce the same error, so callers
// cannot learn which subscriptions exist.
//
// ============================================================================

use crate::error::RoutingError;
use crate::notification::Notification;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::sync::Arc;
use subtle::ConstantTimeEq;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

const RECEIPT_KIND: &str = "r";
const RECEIPT_PATH: &str = "/r/";

/// Decoded contents of a receipt token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptClaims {
    pub uaid: String,
    pub channel_id: String,
    pub receipt_id: String,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ReceiptError {
    #[error("Mismatched receipts origin")]
    Origin,

    #[error("Malformed receipt token")]
    Malformed,

    #[error("Receipt token signature mismatch")]
    Signature,

    #[error("Wrong receipt token components")]
    Components,

    #[error("Wrong receipt token kind")]
    Kind,
}

/// Issues receipt endpoints and parses them back into claims.
///
/// Decoding is CPU-bound and synchronous; the verifier runs it on a blocking
/// worker.
pub trait ReceiptCodec: Send + Sync {
    /// Build the receipt endpoint handed to the application server
    fn make_receipt_endpoint(&self, uaid: &str, channel_id: &str, receipt_id: &str) -> String;

    fn decode(&self, receipt: &str) -> Result<ReceiptClaims, ReceiptError>;
}

/// HMAC-SHA256 receipt codec
pub struct HmacReceiptCodec {
    receipts_url: String,
    secret_key: Vec<u8>,
}

impl HmacReceiptCodec {
    pub fn new(receipts_url: impl Into<String>, secret_key: Vec<u8>) -> Self {
        if secret_key.len() != 32 {
            tracing::warn!(
                key_size = secret_key.len(),
                "RECEIPT_SECRET_KEY should be exactly 32 bytes"
            );
        }

        Self {
            receipts_url: receipts_url.into().trim_end_matches('/').to_string(),
            secret_key,
        }
    }

    fn mac(&self) -> HmacSha256 {
        <HmacSha256 as Mac>::new_from_slice(&self.secret_key)
            .expect("HMAC can take key of any size")
    }

    fn sign(&self, payload: &[u8]) -> Vec<u8> {
        let mut mac = self.mac();
        mac.update(payload);
        mac.finalize().into_bytes().to_vec()
    }
}

impl ReceiptCodec for HmacReceiptCodec {
    fn make_receipt_endpoint(&self, uaid: &str, channel_id: &str, receipt_id: &str) -> String {
        let payload = [RECEIPT_KIND, uaid, channel_id, receipt_id].join(":");
        let signature = self.sign(payload.as_bytes());

        format!(
            "{}{}{}.{}",
            self.receipts_url,
            RECEIPT_PATH,
            URL_SAFE_NO_PAD.encode(payload.as_bytes()),
            URL_SAFE_NO_PAD.encode(signature)
        )
    }

    fn decode(&self, receipt: &str) -> Result<ReceiptClaims, ReceiptError> {
        let token = receipt
            .strip_prefix(self.receipts_url.as_str())
            .and_then(|rest| rest.strip_prefix(RECEIPT_PATH))
            .ok_or(ReceiptError::Origin)?;

        let (payload_b64, signature_b64) =
            token.split_once('.').ok_or(ReceiptError::Malformed)?;

        let payload = URL_SAFE_NO_PAD
            .decode(payload_b64)
            .map_err(|_| ReceiptError::Malformed)?;
        let signature = URL_SAFE_NO_PAD
            .decode(signature_b64)
            .map_err(|_| ReceiptError::Malformed)?;

        let expected = self.sign(&payload);
        if !bool::from(expected.ct_eq(&signature)) {
            return Err(ReceiptError::Signature);
        }

        let payload = String::from_utf8(payload).map_err(|_| ReceiptError::Malformed)?;
        let parts: Vec<&str> = payload.split(':').collect();
        let [kind, uaid, channel_id, receipt_id] = parts.as_slice() else {
            return Err(ReceiptError::Components);
        };

        if *kind != RECEIPT_KIND {
            return Err(ReceiptError::Kind);
        }

        Ok(ReceiptClaims {
            uaid: uaid.to_string(),
            channel_id: channel_id.to_string(),
            receipt_id: receipt_id.to_string(),
        })
    }
}

/// Check an optional receipt request and augment the notification version.
///
/// An empty (or whitespace-only) receipt returns the notification unchanged.
/// Every failure maps to `InvalidReceiptEndpoint` and is not logged here.
pub async fn verify_receipt(
    codec: Arc<dyn ReceiptCodec>,
    uaid: &str,
    notification: Notification,
    receipt: &str,
) -> Result<Notification, RoutingError> {
    let receipt = receipt.trim();
    if receipt.is_empty() {
        return Ok(notification);
    }

    let token = receipt.to_string();
    let claims = tokio::task::spawn_blocking(move || codec.decode(&token))
        .await
        .map_err(|_| RoutingError::InvalidReceiptEndpoint)?
        .map_err(|_| RoutingError::InvalidReceiptEndpoint)?;

    if claims.uaid != uaid || claims.channel_id != notification.channel_id {
        return Err(RoutingError::InvalidReceiptEndpoint);
    }

    Ok(notification.with_receipt(&claims.receipt_id))
}
