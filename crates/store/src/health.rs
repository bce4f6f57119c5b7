//! Queue store health checks.

use tracing::{debug, error};

use crate::store::{QueueStore, StatusCounts};

/// Check that the store answers queries.
pub async fn check_connection(store: &dyn QueueStore) -> bool {
    match store.ping().await {
        Ok(()) => {
            debug!("Queue store healthy");
            true
        }
        Err(e) => {
            error!("Queue store health check failed: {}", e);
            false
        }
    }
}

/// Per-status totals, or `None` if the store cannot be read.
pub async fn queue_depth(store: &dyn QueueStore) -> Option<StatusCounts> {
    match store.counts().await {
        Ok(counts) => Some(counts),
        Err(e) => {
            error!("Failed to read queue counts: {}", e);
            None
        }
    }
}
