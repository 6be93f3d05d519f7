// ============================================================================
// Axum Routes Module
// ============================================================================
//
// Structure:
// - mod.rs: Router assembly and shared request context
// - health.rs: Health check and metrics endpoints
// - push.rs: Push submission endpoint
// - receipts.rs: Receipt issuing and stored message deletion
//
// ============================================================================

mod health;
mod push;
mod receipts;

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::router::WebPushRouter;

/// Shared state for every request
pub struct PushContext {
    pub router: WebPushRouter,
    /// Base of the `Location` header returned for accepted messages
    pub endpoint_url: String,
    pub max_data_bytes: usize,
}

/// Create the application router
pub fn create_router(context: Arc<PushContext>) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/metrics", get(health::metrics))
        .route(
            "/wpush/:uaid/:channel_id",
            put(push::push_notification).post(push::push_notification),
        )
        .route("/receipts/:uaid/:channel_id", post(receipts::issue_receipt))
        .route("/m/:message_id", delete(receipts::delete_message))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .into_inner(),
        )
        .with_state(context)
}
