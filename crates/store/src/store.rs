//! The queue store contract.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use inbox_core::{
    Error, ItemError, ItemId, ItemStatus, MessageMetadata, NoteResult, Payload, QueueItem, Result,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A guarded status transition.
///
/// Applied only if the stored status still equals `from` and, when
/// `expected_attempt` is set, the stored attempt count equals it.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate {
    pub id: ItemId,
    pub from: ItemStatus,
    pub to: ItemStatus,
    pub expected_attempt: Option<u32>,
    /// Recorded on claim.
    pub claimed_by: Option<Uuid>,
    pub result: Option<NoteResult>,
    pub error: Option<ItemError>,
    /// Manual retry starts the attempt budget over.
    pub reset_attempts: bool,
}

impl StatusUpdate {
    fn new(id: ItemId, from: ItemStatus, to: ItemStatus) -> Self {
        Self {
            id,
            from,
            to,
            expected_attempt: None,
            claimed_by: None,
            result: None,
            error: None,
            reset_attempts: false,
        }
    }

    /// Pending -> Processing, fenced on the attempt count the claimer saw.
    pub fn claim(item: &QueueItem, worker: Uuid) -> Self {
        Self {
            expected_attempt: Some(item.attempt_count),
            claimed_by: Some(worker),
            ..Self::new(item.id, ItemStatus::Pending, ItemStatus::Processing)
        }
    }

    /// Processing -> Completed for the claim holding `attempt`.
    pub fn complete(id: ItemId, attempt: u32, result: NoteResult) -> Self {
        Self {
            expected_attempt: Some(attempt),
            result: Some(result),
            ..Self::new(id, ItemStatus::Processing, ItemStatus::Completed)
        }
    }

    /// Processing -> Failed for the claim holding `attempt`.
    pub fn fail(id: ItemId, attempt: u32, error: ItemError) -> Self {
        Self {
            expected_attempt: Some(attempt),
            error: Some(error),
            ..Self::new(id, ItemStatus::Processing, ItemStatus::Failed)
        }
    }

    /// Processing -> Pending for an item whose claim went stale.
    pub fn release(id: ItemId, attempt: u32) -> Self {
        Self {
            expected_attempt: Some(attempt),
            ..Self::new(id, ItemStatus::Processing, ItemStatus::Pending)
        }
    }

    /// Completed | Failed -> Pending on operator request.
    pub fn retry(id: ItemId, from: ItemStatus) -> Self {
        Self {
            reset_attempts: true,
            ..Self::new(id, from, ItemStatus::Pending)
        }
    }

    /// Rejects transitions outside the lifecycle and outcomes that do not
    /// match the target status.
    pub fn validate(&self) -> Result<()> {
        self.from.check_transition(self.to)?;
        if self.reset_attempts && !self.from.is_terminal() {
            return Err(Error::InvalidTransition {
                from: self.from,
                to: self.to,
            });
        }
        match self.to {
            ItemStatus::Completed if self.result.is_none() => {
                Err(Error::validation("completed items need a result"))
            }
            ItemStatus::Failed if self.error.is_none() => {
                Err(Error::validation("failed items need an error"))
            }
            _ => Ok(()),
        }
    }
}

/// Result of a compare-and-swap.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateResult {
    /// The swap won. Carries the item as stored after the write.
    Applied(QueueItem),
    /// The stored status or attempt count no longer matched. Nothing was
    /// written. `current` is `None` when the item does not exist.
    Conflict { current: Option<ItemStatus> },
}

impl UpdateResult {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }

    pub fn into_item(self) -> Option<QueueItem> {
        match self {
            Self::Applied(item) => Some(item),
            Self::Conflict { .. } => None,
        }
    }
}

/// Item totals per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub pending: u64,
    pub processing: u64,
    pub completed: u64,
    pub failed: u64,
}

impl StatusCounts {
    pub fn total(&self) -> u64 {
        self.pending + self.processing + self.completed + self.failed
    }
}

/// Durable queue of items with status-guarded updates.
#[async_trait]
pub trait QueueStore: Send + Sync {
    /// Persist a new Pending item.
    async fn enqueue(&self, payload: Payload, metadata: MessageMetadata) -> Result<ItemId>;

    /// Oldest-first Pending items (arrival time, then id).
    async fn fetch_pending(&self, limit: usize) -> Result<Vec<QueueItem>>;

    /// Compare-and-swap on status. Conflicts are not errors.
    async fn update_status(&self, update: StatusUpdate) -> Result<UpdateResult>;

    async fn get(&self, id: ItemId) -> Result<Option<QueueItem>>;

    /// Items in `status` (all statuses when `None`), newest first.
    async fn list(&self, status: Option<ItemStatus>, limit: usize) -> Result<Vec<QueueItem>>;

    /// Processing items last updated before `older_than`, oldest first.
    async fn fetch_stale(&self, older_than: DateTime<Utc>, limit: usize)
        -> Result<Vec<QueueItem>>;

    async fn counts(&self) -> Result<StatusCounts>;

    /// Cheap round trip used by health checks.
    async fn ping(&self) -> Result<()>;
}
