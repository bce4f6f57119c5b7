//! Request extractors.

use axum::{
    async_trait,
    body::Bytes,
    extract::{FromRequest, Request},
};
use inbox_core::{validate_message, validate_message_size, InboundMessage};
use telemetry::metrics;
use tracing::{debug, warn};

use crate::response::ApiError;
use crate::state::AppState;

/// An inbound message that passed size, shape and sender checks.
#[derive(Debug, Clone)]
pub struct AcceptedMessage(pub InboundMessage);

impl AcceptedMessage {
    fn parse(body: &[u8], state: &AppState) -> Result<InboundMessage, ApiError> {
        validate_message_size(body)?;

        let message: InboundMessage = serde_json::from_slice(body)
            .map_err(|e| ApiError::bad_request(format!("invalid message: {}", e)))?;
        validate_message(&message)?;

        if !state.receiver.allows(message.sender.id) {
            warn!(sender_id = message.sender.id, "Sender not allowed");
            return Err(ApiError::forbidden(format!(
                "sender {} is not allowed",
                message.sender.id
            )));
        }
        Ok(message)
    }
}

#[async_trait]
impl FromRequest<AppState> for AcceptedMessage {
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        metrics().messages_received.inc();

        let body = Bytes::from_request(req, state)
            .await
            .map_err(|e| ApiError::bad_request(e.to_string()))?;

        match Self::parse(&body, state) {
            Ok(message) => Ok(AcceptedMessage(message)),
            Err(e) => {
                metrics().messages_rejected.inc();
                debug!(code = %e.response.code, error = %e.response.error, "Message rejected");
                Err(e)
            }
        }
    }
}
