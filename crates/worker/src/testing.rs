//! Shared fixtures for the worker's unit tests.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use connectors::{ConnectorResult, ReplyMessage, ReplyNotifier};
use inbox_core::{ItemId, MessageMetadata, NoteResult, Payload, ReplyTarget, Sender};
use parking_lot::Mutex;
use queue_store::{QueueStore, SqliteQueueStore};

pub fn memory_store() -> Arc<dyn QueueStore> {
    Arc::new(SqliteQueueStore::in_memory().unwrap())
}

pub fn metadata(reply: bool) -> MessageMetadata {
    MessageMetadata {
        sender: Sender {
            id: 42,
            username: Some("ada".to_string()),
            display_name: None,
        },
        received_at: Utc::now(),
        reply_to: reply.then(|| ReplyTarget {
            chat_id: 42,
            message_id: Some(1),
            callback_url: None,
        }),
    }
}

pub async fn enqueue_text(store: &Arc<dyn QueueStore>, text: &str) -> ItemId {
    store
        .enqueue(
            Payload::Text {
                text: text.to_string(),
                entities: vec![],
            },
            metadata(true),
        )
        .await
        .unwrap()
}

pub fn sample_result() -> NoteResult {
    NoteResult {
        title: "Sample".to_string(),
        tags: vec!["inbox".to_string()],
        folder: "Incoming".to_string(),
        summary: "A sample note".to_string(),
        connections: vec![],
        entities: vec![],
        note_path: "Incoming/Sample.md".to_string(),
        ai_provider: "fallback".to_string(),
        degraded: false,
        degradations: vec![],
    }
}

/// Records every delivered reply.
#[derive(Default)]
pub struct RecordingNotifier {
    pub delivered: Mutex<Vec<(ReplyTarget, ReplyMessage)>>,
}

#[async_trait]
impl ReplyNotifier for RecordingNotifier {
    async fn deliver(&self, target: &ReplyTarget, message: &ReplyMessage) -> ConnectorResult<()> {
        self.delivered.lock().push((target.clone(), message.clone()));
        Ok(())
    }
}
