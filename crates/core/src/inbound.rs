//! Inbound message shape accepted by the receiver, and its validation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::error::{Error, Result, ValidationErrorCode};
use crate::item::{MessageMetadata, Payload, ReplyTarget, Sender};
use crate::limits::{
    MAX_CAPTION_CHARS, MAX_CONTENT_REF_LEN, MAX_ENTITIES, MAX_MESSAGE_BYTES, MAX_TEXT_CHARS,
    MAX_VOICE_DURATION_SECS,
};

/// A message as delivered by the chat transport.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct InboundMessage {
    #[validate(nested)]
    pub sender: Sender,
    #[serde(default)]
    pub reply_to: Option<ReplyTarget>,
    #[validate(custom(function = "validate_payload"))]
    pub payload: Payload,
}

impl InboundMessage {
    /// Split into what the queue stores, stamping the arrival time.
    pub fn into_parts(self, received_at: DateTime<Utc>) -> (Payload, MessageMetadata) {
        let metadata = MessageMetadata {
            sender: self.sender,
            received_at,
            reply_to: self.reply_to,
        };
        (self.payload, metadata)
    }
}

/// Validates raw body size BEFORE deserialization.
pub fn validate_message_size(raw_bytes: &[u8]) -> Result<()> {
    if raw_bytes.len() > MAX_MESSAGE_BYTES {
        return Err(Error::validation_code(
            ValidationErrorCode::MessageTooLarge,
            format!(
                "message {}KB exceeds {}KB limit",
                raw_bytes.len() / 1024,
                MAX_MESSAGE_BYTES / 1024
            ),
        ));
    }
    Ok(())
}

/// Validates a parsed inbound message.
pub fn validate_message(message: &InboundMessage) -> Result<()> {
    message.validate().map_err(|e| {
        let empty = e
            .field_errors()
            .get("payload")
            .map(|errs| errs.iter().any(|err| err.code == "empty_content"))
            .unwrap_or(false);
        if empty {
            Error::validation_code(ValidationErrorCode::EmptyContent, format!("{}", e))
        } else {
            Error::validation(format!("{}", e))
        }
    })?;

    if let Some(ref reply_to) = message.reply_to {
        reply_to
            .validate()
            .map_err(|e| Error::validation(format!("reply_to: {}", e)))?;
    }

    Ok(())
}

/// Whether `sender_id` may enqueue messages. `None` allows everyone.
pub fn is_sender_allowed(allowed: Option<&[i64]>, sender_id: i64) -> bool {
    allowed.map_or(true, |ids| ids.contains(&sender_id))
}

fn payload_error(code: &'static str, message: String) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(message.into());
    err
}

fn check_chars(field: &str, value: &str, max: usize) -> std::result::Result<(), ValidationError> {
    let len = value.chars().count();
    if len > max {
        return Err(payload_error(
            "too_long",
            format!("{} has {} chars, exceeds {} limit", field, len, max),
        ));
    }
    Ok(())
}

fn validate_payload(payload: &Payload) -> std::result::Result<(), ValidationError> {
    if let Some(caption) = payload.caption() {
        check_chars("caption", caption, MAX_CAPTION_CHARS)?;
    }

    if let Some(file) = payload.content_ref() {
        let reference = file.as_str().trim();
        if reference.is_empty() {
            return Err(payload_error(
                "empty_content",
                "file reference is empty".to_string(),
            ));
        }
        if reference.len() > MAX_CONTENT_REF_LEN {
            return Err(payload_error(
                "too_long",
                format!("file reference exceeds {} bytes", MAX_CONTENT_REF_LEN),
            ));
        }
    }

    match payload {
        Payload::Text { text, entities } => {
            if text.trim().is_empty() {
                return Err(payload_error("empty_content", "text is empty".to_string()));
            }
            check_chars("text", text, MAX_TEXT_CHARS)?;
            if entities.len() > MAX_ENTITIES {
                return Err(payload_error(
                    "too_many_entities",
                    format!("{} entities exceeds {} limit", entities.len(), MAX_ENTITIES),
                ));
            }
            let text_units = text.encode_utf16().count();
            for entity in entities {
                let in_range = entity
                    .offset
                    .checked_add(entity.length)
                    .is_some_and(|end| end <= text_units);
                if !in_range {
                    return Err(payload_error(
                        "entity_out_of_range",
                        format!(
                            "entity at {}+{} exceeds text length {}",
                            entity.offset, entity.length, text_units
                        ),
                    ));
                }
            }
        }
        Payload::Voice { duration_secs, .. } if *duration_secs > MAX_VOICE_DURATION_SECS => {
            return Err(payload_error(
                "too_long",
                format!(
                    "voice note of {}s exceeds {}s limit",
                    duration_secs, MAX_VOICE_DURATION_SECS
                ),
            ));
        }
        Payload::Photo { .. } | Payload::Document { .. } | Payload::Voice { .. } => {}
    }

    Ok(())
}
