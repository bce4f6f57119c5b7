//! Receiver endpoint.
//!
//! Validates a chat message, stores it as a Pending item and acknowledges
//! immediately. Processing happens later, in the processor.

use std::time::Instant;

use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use telemetry::metrics;
use tracing::{error, info};

use crate::extractors::AcceptedMessage;
use crate::response::{AckResponse, ApiError};
use crate::state::AppState;

/// POST /messages - Enqueue an inbound message.
pub async fn receive_handler(
    State(state): State<AppState>,
    AcceptedMessage(message): AcceptedMessage,
) -> Result<(StatusCode, Json<AckResponse>), ApiError> {
    let start = Instant::now();
    let sender_id = message.sender.id;
    let (payload, metadata) = message.into_parts(Utc::now());
    let kind = payload.kind();

    let id = state.store.enqueue(payload, metadata).await.map_err(|e| {
        error!(sender_id, error = %e, "Failed to enqueue message");
        ApiError::from(e)
    })?;

    metrics().items_enqueued.inc();
    let latency_ms = start.elapsed().as_millis() as u64;
    metrics().receive_latency_ms.observe(latency_ms);

    info!(item_id = %id, sender_id, kind, latency_ms, "Message enqueued");

    Ok((StatusCode::ACCEPTED, Json(AckResponse::pending(id))))
}
