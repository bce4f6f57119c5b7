//! Application state shared across handlers.

use std::sync::Arc;
use std::time::Duration;

use inbox_core::is_sender_allowed;
use queue_store::QueueStore;
use serde::{Deserialize, Serialize};
use worker::Recovery;

/// Receiver configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReceiverConfig {
    /// Sender ids allowed to enqueue. Empty allows everyone.
    #[serde(default)]
    pub allowed_users: Vec<i64>,
}

impl ReceiverConfig {
    pub fn allows(&self, sender_id: i64) -> bool {
        let allowed = (!self.allowed_users.is_empty()).then_some(self.allowed_users.as_slice());
        is_sender_allowed(allowed, sender_id)
    }
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Queue store (SQLite in production and tests)
    pub store: Arc<dyn QueueStore>,
    /// Staleness recovery and manual retry
    pub recovery: Arc<Recovery>,
    pub receiver: Arc<ReceiverConfig>,
    /// Default threshold for `POST /recover`
    pub stale_after: Duration,
}

impl AppState {
    pub fn new(
        store: Arc<dyn QueueStore>,
        max_attempts: u32,
        receiver: ReceiverConfig,
        stale_after: Duration,
    ) -> Self {
        Self {
            recovery: Arc::new(Recovery::new(store.clone(), max_attempts)),
            store,
            receiver: Arc::new(receiver),
            stale_after,
        }
    }
}
