//! Status resolver: writes the pipeline outcome and replies to the sender.

use std::sync::Arc;

use connectors::{ReplyMessage, ReplyNotifier};
use inbox_core::{Error, PipelineOutcome, QueueItem, Result};
use queue_store::{QueueStore, StatusUpdate, UpdateResult};
use telemetry::metrics;
use tracing::{error, info, warn};

/// Finalizes claimed items.
pub struct StatusResolver {
    store: Arc<dyn QueueStore>,
    notifier: Arc<dyn ReplyNotifier>,
    send_preview: bool,
}

impl StatusResolver {
    pub fn new(
        store: Arc<dyn QueueStore>,
        notifier: Arc<dyn ReplyNotifier>,
        send_preview: bool,
    ) -> Self {
        Self {
            store,
            notifier,
            send_preview,
        }
    }

    /// Write `outcome` for an item this processor claimed.
    ///
    /// The write is fenced on the claim's attempt count. A conflict means
    /// the claim was lost (recovered as stale and claimed again, or retried
    /// by an operator): it is reported as an internal consistency error and
    /// no reply is sent.
    pub async fn finalize(&self, claimed: &QueueItem, outcome: PipelineOutcome) -> Result<QueueItem> {
        let id = claimed.id;
        let attempt = claimed.attempt_count;
        let target = outcome.target_status();
        let degraded = outcome.is_degraded();

        let update = match outcome {
            PipelineOutcome::Completed(result) => StatusUpdate::complete(id, attempt, result),
            PipelineOutcome::Failed(err) => StatusUpdate::fail(id, attempt, err),
        };

        let item = match self.store.update_status(update).await? {
            UpdateResult::Applied(item) => item,
            UpdateResult::Conflict { current } => {
                metrics().finalize_conflicts.inc();
                error!(
                    item_id = %id,
                    attempt,
                    target = target.as_str(),
                    current = ?current,
                    "Finalize conflict: claim no longer held"
                );
                return Err(Error::internal_consistency(
                    id,
                    format!(
                        "expected processing at attempt {}, found {}",
                        attempt,
                        current.map_or("nothing", |s| s.as_str())
                    ),
                ));
            }
        };

        match (&item.result, &item.error) {
            (Some(result), _) => {
                metrics().items_completed.inc();
                if degraded {
                    metrics().items_degraded.inc();
                }
                info!(
                    item_id = %id,
                    note = %result.note_path,
                    degraded,
                    "Item completed"
                );
            }
            (None, Some(err)) => {
                metrics().items_failed.inc();
                warn!(item_id = %id, stage = err.stage.as_str(), cause = %err.cause, "Item failed");
            }
            (None, None) => {}
        }

        self.reply(&item).await;
        Ok(item)
    }

    /// Best effort. Delivery errors never change the item.
    async fn reply(&self, item: &QueueItem) {
        let Some(target) = &item.metadata.reply_to else {
            return;
        };

        let message = match (&item.result, &item.error) {
            (Some(result), _) if self.send_preview => ReplyMessage::saved(item.id, result),
            (None, Some(err)) => ReplyMessage::failed(item.id, err),
            _ => return,
        };

        match self.notifier.deliver(target, &message).await {
            Ok(()) => metrics().replies_sent.inc(),
            Err(e) => {
                metrics().reply_errors.inc();
                warn!(item_id = %item.id, error = %e, "Reply delivery failed");
            }
        }
    }
}
