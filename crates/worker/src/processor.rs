//! Queue processor: one run claims pending items, pipelines them and
//! finalizes each.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use inbox_core::{PipelineOutcome, QueueItem, Result};
use queue_store::QueueStore;
use serde::Serialize;
use telemetry::metrics;
use tokio::sync::watch;
use tracing::{debug, error, info, info_span, Instrument};
use uuid::Uuid;

use crate::claim::ClaimManager;
use crate::config::ProcessorConfig;
use crate::executor::PipelineExecutor;
use crate::recovery::Recovery;
use crate::resolver::StatusResolver;
use crate::stages::{standard_stages, Collaborators, PipelineSettings};

/// Totals for one processor run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub fetched: usize,
    pub claimed: usize,
    pub completed: usize,
    pub degraded: usize,
    pub failed: usize,
    /// Items another processor claimed first.
    pub conflicts: usize,
    /// Store errors and finalize conflicts.
    pub errors: usize,
}

enum ItemOutcome {
    Lost,
    Completed { degraded: bool },
    Failed,
    Error,
}

pub struct Processor {
    store: Arc<dyn QueueStore>,
    claims: ClaimManager,
    executor: PipelineExecutor,
    resolver: StatusResolver,
    recovery: Recovery,
    config: ProcessorConfig,
}

impl Processor {
    pub fn new(
        store: Arc<dyn QueueStore>,
        collaborators: &Collaborators,
        settings: &PipelineSettings,
        config: ProcessorConfig,
        send_preview: bool,
    ) -> Self {
        let executor = PipelineExecutor::new(standard_stages(collaborators, settings), &config);
        Self::with_executor(
            store,
            executor,
            collaborators.notifier.clone(),
            config,
            send_preview,
        )
    }

    /// Build around an already assembled executor.
    pub fn with_executor(
        store: Arc<dyn QueueStore>,
        executor: PipelineExecutor,
        notifier: Arc<dyn connectors::ReplyNotifier>,
        config: ProcessorConfig,
        send_preview: bool,
    ) -> Self {
        let worker_id = Uuid::new_v4();
        Self {
            claims: ClaimManager::new(store.clone(), worker_id),
            resolver: StatusResolver::new(store.clone(), notifier, send_preview),
            recovery: Recovery::new(store.clone(), config.max_attempts),
            executor,
            store,
            config,
        }
    }

    pub fn worker_id(&self) -> Uuid {
        self.claims.worker_id()
    }

    pub fn store(&self) -> &Arc<dyn QueueStore> {
        &self.store
    }

    pub fn recovery(&self) -> &Recovery {
        &self.recovery
    }

    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    /// Process one batch of Pending items.
    ///
    /// Items already started run to finalization; once `shutdown` flips no
    /// new item is claimed.
    pub async fn run_once(&self, shutdown: &watch::Receiver<bool>) -> Result<RunSummary> {
        let pending = self.store.fetch_pending(self.config.batch_size).await?;
        let mut summary = RunSummary {
            fetched: pending.len(),
            ..RunSummary::default()
        };
        if pending.is_empty() {
            return Ok(summary);
        }

        debug!(
            worker_id = %self.worker_id(),
            fetched = pending.len(),
            "Processing batch"
        );

        let outcomes: Vec<ItemOutcome> = stream::iter(pending)
            .take_while(|_| futures::future::ready(!*shutdown.borrow()))
            .map(|item| self.process_item(item))
            .buffer_unordered(self.config.concurrency.max(1))
            .collect()
            .await;

        for outcome in outcomes {
            match outcome {
                ItemOutcome::Lost => summary.conflicts += 1,
                ItemOutcome::Completed { degraded } => {
                    summary.claimed += 1;
                    summary.completed += 1;
                    if degraded {
                        summary.degraded += 1;
                    }
                }
                ItemOutcome::Failed => {
                    summary.claimed += 1;
                    summary.failed += 1;
                }
                ItemOutcome::Error => summary.errors += 1,
            }
        }

        info!(
            fetched = summary.fetched,
            completed = summary.completed,
            degraded = summary.degraded,
            failed = summary.failed,
            conflicts = summary.conflicts,
            errors = summary.errors,
            "Processor run complete"
        );
        Ok(summary)
    }

    /// Run batches until the queue is empty or shutdown is requested.
    pub async fn drain(&self, shutdown: &watch::Receiver<bool>) -> Result<RunSummary> {
        let mut total = RunSummary::default();
        loop {
            let run = self.run_once(shutdown).await?;
            total.fetched += run.fetched;
            total.claimed += run.claimed;
            total.completed += run.completed;
            total.degraded += run.degraded;
            total.failed += run.failed;
            total.conflicts += run.conflicts;
            total.errors += run.errors;

            let made_progress = run.claimed + run.conflicts > 0;
            if *shutdown.borrow() || !made_progress || run.fetched < self.config.batch_size {
                return Ok(total);
            }
        }
    }

    async fn process_item(&self, item: QueueItem) -> ItemOutcome {
        let claimed = match self.claims.claim(&item).await {
            Ok(Some(claimed)) => claimed,
            Ok(None) => return ItemOutcome::Lost,
            Err(e) => {
                error!(item_id = %item.id, error = %e, "Claim failed");
                return ItemOutcome::Error;
            }
        };

        let span = info_span!(
            "item",
            item_id = %claimed.id,
            attempt = claimed.attempt_count,
            kind = claimed.payload.kind()
        );

        async {
            metrics().in_flight.inc();
            let outcome = self.executor.run(&claimed).await;
            let result = match &outcome {
                PipelineOutcome::Completed(note) => ItemOutcome::Completed {
                    degraded: note.degraded,
                },
                PipelineOutcome::Failed(_) => ItemOutcome::Failed,
            };
            let finalized = self.resolver.finalize(&claimed, outcome).await;
            metrics().in_flight.dec();

            match finalized {
                Ok(_) => result,
                Err(e) => {
                    error!(error = %e, "Finalize failed");
                    ItemOutcome::Error
                }
            }
        }
        .instrument(span)
        .await
    }
}
