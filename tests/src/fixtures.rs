//! Test fixtures: inbound message bodies.

use serde_json::{json, Value};

/// Sender id used by fixtures unless a test picks another.
pub const SENDER_ID: i64 = 4242;

fn envelope(sender_id: i64, payload: Value) -> Value {
    json!({
        "sender": {
            "id": sender_id,
            "username": "ada",
            "display_name": "Ada Lovelace"
        },
        "reply_to": {
            "chat_id": sender_id,
            "message_id": 17
        },
        "payload": payload
    })
}

/// Plain text message.
pub fn text_message(text: &str) -> Value {
    text_message_from(SENDER_ID, text)
}

pub fn text_message_from(sender_id: i64, text: &str) -> Value {
    envelope(sender_id, json!({ "type": "text", "text": text }))
}

/// Text message whose only link hides behind a text-link entity.
pub fn text_link_message(text: &str, offset: usize, length: usize, url: &str) -> Value {
    envelope(
        SENDER_ID,
        json!({
            "type": "text",
            "text": text,
            "entities": [
                { "offset": offset, "length": length, "kind": "text_link", "url": url }
            ]
        }),
    )
}

pub fn photo_message(file: &str, caption: Option<&str>) -> Value {
    envelope(
        SENDER_ID,
        json!({ "type": "photo", "file": file, "caption": caption }),
    )
}

pub fn document_message(file: &str, file_name: &str, mime_type: &str) -> Value {
    envelope(
        SENDER_ID,
        json!({
            "type": "document",
            "file": file,
            "file_name": file_name,
            "mime_type": mime_type
        }),
    )
}

pub fn voice_message(file: &str, duration_secs: u32) -> Value {
    envelope(
        SENDER_ID,
        json!({ "type": "voice", "file": file, "duration_secs": duration_secs }),
    )
}

/// Message without a reply target.
pub fn silent_text_message(text: &str) -> Value {
    let mut message = text_message(text);
    message["reply_to"] = Value::Null;
    message
}

/// Reference the mock content fetcher does not know.
pub const DEAD_REF: &str = "https://files.test/expired-file-id";
