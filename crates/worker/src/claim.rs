//! Claim manager: Pending -> Processing through the store's CAS.

use std::sync::Arc;

use inbox_core::{QueueItem, Result};
use queue_store::{QueueStore, StatusUpdate, UpdateResult};
use telemetry::metrics;
use tracing::debug;
use uuid::Uuid;

/// Claims items on behalf of one processor run.
pub struct ClaimManager {
    store: Arc<dyn QueueStore>,
    worker_id: Uuid,
}

impl ClaimManager {
    pub fn new(store: Arc<dyn QueueStore>, worker_id: Uuid) -> Self {
        Self { store, worker_id }
    }

    pub fn worker_id(&self) -> Uuid {
        self.worker_id
    }

    /// Try to claim `item`.
    ///
    /// Returns the item as stored after the claim, or `None` when another
    /// processor got there first. Losing a race is not an error.
    pub async fn claim(&self, item: &QueueItem) -> Result<Option<QueueItem>> {
        match self
            .store
            .update_status(StatusUpdate::claim(item, self.worker_id))
            .await?
        {
            UpdateResult::Applied(claimed) => {
                metrics().items_claimed.inc();
                debug!(
                    item_id = %claimed.id,
                    attempt = claimed.attempt_count,
                    "Item claimed"
                );
                Ok(Some(claimed))
            }
            UpdateResult::Conflict { current } => {
                metrics().claim_conflicts.inc();
                debug!(item_id = %item.id, current = ?current, "Claim lost");
                Ok(None)
            }
        }
    }

    /// Fetch up to `limit` Pending items and claim each, in arrival order.
    pub async fn claim_batch(&self, limit: usize) -> Result<Vec<QueueItem>> {
        let pending = self.store.fetch_pending(limit).await?;
        let mut claimed = Vec::with_capacity(pending.len());
        for item in &pending {
            if let Some(item) = self.claim(item).await? {
                claimed.push(item);
            }
        }
        Ok(claimed)
    }
}
