//! Staleness recovery and manual retry.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use inbox_core::{Error, ItemError, ItemId, ItemStatus, QueueItem, Result, StageKind};
use queue_store::{QueueStore, StatusUpdate, UpdateResult};
use serde::Serialize;
use telemetry::metrics;
use tracing::{info, warn};

const RECOVERY_BATCH: usize = 100;

/// What one recovery pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RecoveryReport {
    pub scanned: usize,
    /// Returned to Pending.
    pub released: usize,
    /// Out of attempts, marked Failed.
    pub abandoned: usize,
    /// Touched by someone else between scan and update.
    pub conflicts: usize,
}

/// Returns abandoned Processing items to the queue and handles operator
/// retries.
pub struct Recovery {
    store: Arc<dyn QueueStore>,
    max_attempts: u32,
}

impl Recovery {
    pub fn new(store: Arc<dyn QueueStore>, max_attempts: u32) -> Self {
        Self {
            store,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Release Processing items not updated within `threshold`.
    ///
    /// Items that already used `max_attempts` claims are failed instead.
    /// Every transition is fenced on the attempt count seen at scan time,
    /// so a processor that finishes meanwhile wins.
    pub async fn recover_stale(&self, threshold: Duration) -> Result<RecoveryReport> {
        let threshold = chrono::Duration::from_std(threshold)
            .map_err(|e| Error::validation(format!("invalid staleness threshold: {}", e)))?;
        let cutoff = Utc::now().checked_sub_signed(threshold).ok_or_else(|| {
            Error::validation(format!(
                "staleness threshold of {}s reaches before the earliest date",
                threshold.num_seconds()
            ))
        })?;
        let mut report = RecoveryReport::default();

        loop {
            let stale = self.store.fetch_stale(cutoff, RECOVERY_BATCH).await?;
            let batch_len = stale.len();

            for item in stale {
                report.scanned += 1;
                self.recover_item(&item, &mut report).await?;
            }

            // Released items are Pending and conflicting ones moved on, so a
            // full batch means there may be more behind it.
            if batch_len < RECOVERY_BATCH {
                break;
            }
        }

        if report.scanned > 0 {
            info!(
                scanned = report.scanned,
                released = report.released,
                abandoned = report.abandoned,
                conflicts = report.conflicts,
                "Staleness recovery complete"
            );
        }
        Ok(report)
    }

    async fn recover_item(&self, item: &QueueItem, report: &mut RecoveryReport) -> Result<()> {
        let attempt = item.attempt_count;
        let update = if attempt >= self.max_attempts {
            StatusUpdate::fail(
                item.id,
                attempt,
                ItemError::new(
                    StageKind::Recovery,
                    format!("gave up after {} attempts", attempt),
                ),
            )
        } else {
            StatusUpdate::release(item.id, attempt)
        };
        let abandoning = update.to == ItemStatus::Failed;

        match self.store.update_status(update).await? {
            UpdateResult::Applied(_) if abandoning => {
                metrics().items_abandoned.inc();
                warn!(item_id = %item.id, attempts = attempt, "Stale item abandoned");
                report.abandoned += 1;
            }
            UpdateResult::Applied(_) => {
                metrics().items_recovered.inc();
                info!(item_id = %item.id, attempts = attempt, "Stale item released");
                report.released += 1;
            }
            UpdateResult::Conflict { current } => {
                info!(item_id = %item.id, current = ?current, "Stale item moved on, skipped");
                report.conflicts += 1;
            }
        }
        Ok(())
    }

    /// Move a Completed or Failed item back to Pending with a fresh
    /// attempt budget.
    pub async fn retry(&self, id: ItemId) -> Result<QueueItem> {
        let item = self.store.get(id).await?.ok_or(Error::NotFound(id))?;
        if !item.status.is_terminal() {
            return Err(Error::InvalidTransition {
                from: item.status,
                to: ItemStatus::Pending,
            });
        }

        match self
            .store
            .update_status(StatusUpdate::retry(id, item.status))
            .await?
        {
            UpdateResult::Applied(item) => {
                metrics().items_retried.inc();
                info!(item_id = %id, "Item queued for retry");
                Ok(item)
            }
            UpdateResult::Conflict { current } => Err(Error::Conflict {
                id,
                expected: item.status,
                actual: current,
            }),
        }
    }
}
