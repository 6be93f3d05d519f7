// ============================================================================
// Receipt and Message Routes
// ============================================================================
//
// Endpoints:
// - POST /receipts/:uaid/:channel_id - Issue a receipt endpoint (201 + Location)
// - DELETE /m/:message_id - Drop a stored message (204)
//
// ============================================================================

use axum::{
    extract::{Path, State},
    http::StatusCode,
};
use std::sync::Arc;

use super::PushContext;
use crate::error::RoutingResult;
use crate::response::RouterResponse;

/// POST /receipts/:uaid/:channel_id
pub async fn issue_receipt(
    State(context): State<Arc<PushContext>>,
    Path((uaid, channel_id)): Path<(String, String)>,
) -> RoutingResult<RouterResponse> {
    context.router.issue_receipt(&uaid, &channel_id).await
}

/// DELETE /m/:message_id
///
/// Messages already handed to a node are not recalled. Unknown ids still
/// answer 204.
pub async fn delete_message(
    State(context): State<Arc<PushContext>>,
    Path(message_id): Path<String>,
) -> RoutingResult<StatusCode> {
    context.router.delete_message(&message_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
