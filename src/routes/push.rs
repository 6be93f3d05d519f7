// ============================================================================
// Push Routes
// ============================================================================
//
// Endpoints:
// - PUT|POST /wpush/:uaid/:channel_id - Submit a notification for a device
//
// The body is the encrypted payload; it is base64url-encoded before routing.
// An empty body is a wake-up ping.
//
// ============================================================================

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::HeaderMap,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use std::sync::Arc;
use uuid::Uuid;

use super::PushContext;
use crate::error::{RoutingError, RoutingResult};
use crate::notification::{CryptoHeaders, Notification, HEADER_PUSH_RECEIPT, HEADER_TTL};
use crate::response::RouterResponse;

/// PUT|POST /wpush/:uaid/:channel_id
pub async fn push_notification(
    State(context): State<Arc<PushContext>>,
    Path((uaid, channel_id)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> RoutingResult<RouterResponse> {
    if body.len() > context.max_data_bytes {
        return Err(RoutingError::PayloadTooLarge {
            size: body.len(),
            max: context.max_data_bytes,
        });
    }

    let data = (!body.is_empty()).then(|| URL_SAFE_NO_PAD.encode(&body));
    let ttl = parse_ttl(&headers);
    let receipt = header_str(&headers, HEADER_PUSH_RECEIPT).unwrap_or_default();

    let notification = Notification::new(
        channel_id,
        Uuid::new_v4().simple().to_string(),
        data,
        headers
            .iter()
            .filter_map(|(name, value)| Some((name.as_str(), value.to_str().ok()?))),
        ttl,
    );

    // Reject before touching any backend
    if notification.has_data() {
        CryptoHeaders::from_notification(&notification)?;
    }

    context
        .router
        .route(&uaid, notification, receipt, &context.endpoint_url)
        .await
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// TTL in seconds. A missing or unparseable header means zero.
fn parse_ttl(headers: &HeaderMap) -> u64 {
    header_str(headers, HEADER_TTL)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_parse_ttl() {
        let mut headers = HeaderMap::new();
        assert_eq!(parse_ttl(&headers), 0);

        headers.insert("ttl", HeaderValue::from_static(" 60 "));
        assert_eq!(parse_ttl(&headers), 60);

        headers.insert("ttl", HeaderValue::from_static("-5"));
        assert_eq!(parse_ttl(&headers), 0);

        headers.insert("ttl", HeaderValue::from_static("soon"));
        assert_eq!(parse_ttl(&headers), 0);
    }
}
