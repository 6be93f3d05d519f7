// ============================================================================
// HTTP API Tests
// ============================================================================
//
// Drives the axum router in-process with tower's oneshot:
// - PUT|POST /wpush/:uaid/:channel_id
// - POST /receipts/:uaid/:channel_id
// - DELETE /m/:message_id
// - GET /health
// - GET /metrics
//
// ============================================================================

use axum::{
    body::Body,
    http::{Request, StatusCode},
    response::Response,
};
use push_router::memory::MemoryBackend;
use push_router::notification::MAX_TTL_SECS;
use push_router::receipt::{HmacReceiptCodec, ReceiptCodec};
use push_router::routes::{create_router, PushContext};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

use test_utils::{harness, RecordingTransport, TestHarness, ENDPOINT, NODE, NOW};

const MAX_DATA_BYTES: usize = 16;

/// Backends kept by the test for assertions
struct Backends {
    backend: Arc<MemoryBackend>,
    transport: Arc<RecordingTransport>,
    codec: Arc<HmacReceiptCodec>,
}

async fn app() -> (axum::Router, Backends) {
    let TestHarness {
        backend,
        transport,
        codec,
        router,
        ..
    } = harness().await;

    let app = create_router(Arc::new(PushContext {
        router,
        endpoint_url: ENDPOINT.to_string(),
        max_data_bytes: MAX_DATA_BYTES,
    }));
    (
        app,
        Backends {
            backend,
            transport,
            codec,
        },
    )
}

fn push(uaid: &str, channel_id: &str) -> axum::http::request::Builder {
    Request::builder()
        .method("PUT")
        .uri(format!("/wpush/{}/{}", uaid, channel_id))
}

async fn body_json(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_encrypted_push_is_stored() {
    let (app, h) = app().await;

    let response = app
        .oneshot(
            push("u1", "c1")
                .header("TTL", "60")
                .header("Content-Encoding", "aes128gcm")
                .header("Encryption", "salt=abc")
                .body(Body::from("hello"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let location = response.headers()["location"].to_str().unwrap();
    assert!(location.starts_with("https://push.example.com/m/"));

    let stored = h.backend.messages_for("u1").await;
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].data.as_deref(), Some("aGVsbG8"));
    assert_eq!(location, format!("{}/m/{}", ENDPOINT, stored[0].message_id));
}

#[tokio::test]
async fn test_ping_is_delivered_to_live_node() {
    let (app, h) = app().await;
    h.backend.set_node("u1", NODE).await;

    let response = app
        .oneshot(
            push("u1", "c1")
                .method("POST")
                .header("ttl", "60")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(h.backend.store_calls(), 0);

    let puts = h.transport.puts.lock().unwrap();
    assert_eq!(puts.len(), 1);
    assert!(puts[0].2.data.is_none());
}

#[tokio::test]
async fn test_missing_crypto_headers_rejected_before_routing() {
    let (app, h) = app().await;

    let response = app
        .oneshot(
            push("u1", "c1")
                .header("ttl", "60")
                .header("content-encoding", "aes128gcm")
                .body(Body::from("hello"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(h.backend.registry_lookups(), 0);
    assert_eq!(h.backend.store_calls(), 0);

    let body = body_json(response).await;
    assert_eq!(body["error_code"], "MISSING_CRYPTO_HEADERS");
    assert_eq!(body["status"], 400);
}

#[tokio::test]
async fn test_oversized_payload_rejected() {
    let (app, h) = app().await;

    let response = app
        .oneshot(
            push("u1", "c1")
                .header("ttl", "60")
                .header("content-encoding", "aes128gcm")
                .header("encryption", "salt=abc")
                .body(Body::from(vec![0u8; MAX_DATA_BYTES + 1]))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(h.backend.store_calls(), 0);
}

#[tokio::test]
async fn test_unknown_channel_is_not_found() {
    let (app, _h) = app().await;

    let response = app
        .oneshot(push("u1", "c2").header("ttl", "60").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["error_code"], "NO_SUCH_SUBSCRIPTION");
}

#[tokio::test]
async fn test_bad_receipt_is_bad_request() {
    let (app, h) = app().await;

    let response = app
        .oneshot(
            push("u1", "c1")
                .header("ttl", "60")
                .header("push-receipt", "https://elsewhere.example.com/r/abc.def")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(h.backend.registry_lookups(), 0);
}

#[tokio::test]
async fn test_missing_ttl_finishes_routing() {
    let (app, h) = app().await;

    let response = app
        .oneshot(push("u1", "c1").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(h.backend.store_calls(), 0);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert!(body.is_empty());
}

#[tokio::test]
async fn test_huge_ttl_is_clamped() {
    let (app, h) = app().await;

    let response = app
        .oneshot(
            push("u1", "c1")
                .header("ttl", "99999999999")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let stored = h.backend.messages_for("u1").await;
    assert_eq!(stored[0].expiry, NOW + MAX_TTL_SECS as i64);
}

#[tokio::test]
async fn test_issued_receipt_round_trip() {
    let (app, h) = app().await;

    let response = app
        .clone()
        .oneshot(
            Request::post("/receipts/u1/c1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let receipt = response.headers()["location"].to_str().unwrap().to_string();
    let claims = h.codec.decode(&receipt).unwrap();

    let response = app
        .oneshot(
            push("u1", "c1")
                .header("ttl", "60")
                .header("push-receipt", &receipt)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let stored = h.backend.messages_for("u1").await;
    assert!(stored[0]
        .message_id
        .ends_with(&format!(":{}", claims.receipt_id)));
}

#[tokio::test]
async fn test_receipt_for_unowned_channel_is_not_found() {
    let (app, _h) = app().await;

    let response = app
        .oneshot(
            Request::post("/receipts/u1/c2")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(response.headers().get("location").is_none());
}

#[tokio::test]
async fn test_delete_stored_message() {
    let (app, h) = app().await;

    let response = app
        .clone()
        .oneshot(push("u1", "c1").header("ttl", "60").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let location = response.headers()["location"].to_str().unwrap();
    let path = location.strip_prefix(ENDPOINT).unwrap().to_string();
    assert_eq!(h.backend.messages_for("u1").await.len(), 1);

    let response = app
        .oneshot(Request::delete(path).body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(h.backend.messages_for("u1").await.is_empty());
}

#[tokio::test]
async fn test_delete_with_store_down_is_unavailable() {
    let (app, h) = app().await;
    h.backend.fail_store(true);

    let response = app
        .oneshot(Request::delete("/m/v1").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_health() {
    let (app, _h) = app().await;

    let response = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "OK");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(body["storage"], serde_json::json!({"status": "OK"}));
    assert_eq!(body["router"], serde_json::json!({"status": "OK"}));
}

#[tokio::test]
async fn test_health_reports_failing_storage() {
    let (app, h) = app().await;
    h.backend.fail_store(true);

    let response = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = body_json(response).await;
    assert_eq!(body["status"], "NOT OK");
    assert_eq!(body["storage"]["status"], "NOT OK");
    assert_eq!(body["storage"]["error"], "Internal error");
    assert_eq!(body["router"]["status"], "OK");
}

#[tokio::test]
async fn test_health_reports_failing_node_directory() {
    let (app, h) = app().await;
    h.backend.fail_nodes(true);

    let response = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = body_json(response).await;
    assert_eq!(body["storage"]["status"], "OK");
    assert_eq!(body["router"]["status"], "NOT OK");
}

#[tokio::test]
async fn test_metrics() {
    let (app, _h) = app().await;

    let response = app
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}
