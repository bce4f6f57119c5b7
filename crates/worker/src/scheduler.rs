//! Worker scheduler for background tasks.

use std::sync::Arc;

use connectors::{AiAnalyzer, NoteStore};
use queue_store::health::{check_connection, queue_depth};
use telemetry::{health, metrics};
use tokio::sync::watch;
use tokio::time::interval;
use tracing::{error, info};

use crate::processor::Processor;

/// Background worker scheduler.
///
/// Runs the processor on a fixed interval, staleness recovery when
/// enabled, and a periodic metrics and health sweep. Every loop exits when
/// the shutdown channel flips.
pub struct WorkerScheduler {
    processor: Arc<Processor>,
    analyzer: Option<Arc<dyn AiAnalyzer>>,
    notes: Option<Arc<dyn NoteStore>>,
    shutdown: watch::Receiver<bool>,
}

impl WorkerScheduler {
    pub fn new(processor: Arc<Processor>, shutdown: watch::Receiver<bool>) -> Self {
        Self {
            processor,
            analyzer: None,
            notes: None,
            shutdown,
        }
    }

    /// Probe the AI provider and the vault during the health sweep.
    pub fn with_probes(
        mut self,
        analyzer: Option<Arc<dyn AiAnalyzer>>,
        notes: Arc<dyn NoteStore>,
    ) -> Self {
        self.analyzer = analyzer;
        self.notes = Some(notes);
        self
    }

    /// Starts all background workers.
    pub fn start(self: Arc<Self>) -> Vec<tokio::task::JoinHandle<()>> {
        let mut handles = Vec::new();
        let config = self.processor.config();

        if config.enabled {
            let scheduler = self.clone();
            handles.push(tokio::spawn(async move {
                scheduler.run_processor().await;
            }));
            info!(
                interval_secs = config.poll_interval().as_secs(),
                concurrency = config.concurrency,
                "Processor started"
            );
        }

        if config.auto_recover {
            let scheduler = self.clone();
            handles.push(tokio::spawn(async move {
                scheduler.run_recovery().await;
            }));
            info!(
                stale_after_secs = config.stale_after_secs,
                "Staleness recovery started"
            );
        }

        let scheduler = self.clone();
        handles.push(tokio::spawn(async move {
            scheduler.run_metrics_sweep().await;
        }));

        info!("Background workers started");
        handles
    }

    async fn run_processor(&self) {
        let mut shutdown = self.shutdown.clone();
        let mut ticker = interval(self.processor.config().poll_interval());

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.changed() => break,
            }
            if *shutdown.borrow() {
                break;
            }

            if let Err(e) = self.processor.drain(&shutdown).await {
                error!("Processor run error: {}", e);
            }
        }
        info!("Processor stopped");
    }

    async fn run_recovery(&self) {
        let mut shutdown = self.shutdown.clone();
        let threshold = self.processor.config().stale_after();
        let mut ticker = interval(self.processor.config().poll_interval());

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.changed() => break,
            }
            if *shutdown.borrow() {
                break;
            }

            if let Err(e) = self.processor.recovery().recover_stale(threshold).await {
                error!("Staleness recovery error: {}", e);
            }
        }
    }

    async fn run_metrics_sweep(&self) {
        let mut shutdown = self.shutdown.clone();
        let mut ticker = interval(self.processor.config().metrics_interval());

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.changed() => break,
            }
            if *shutdown.borrow() {
                break;
            }

            let store = self.processor.store();
            let store_ok = check_connection(store.as_ref()).await;
            health().store.record(store_ok, "queue store unreachable");

            if let Some(counts) = queue_depth(store.as_ref()).await {
                metrics().queue_depth.set(counts.pending);
            }

            if let Some(analyzer) = &self.analyzer {
                match analyzer.ping().await {
                    Ok(()) => health().ai.set_healthy(),
                    Err(e) => health().ai.set_unhealthy(e.to_string()),
                }
            }

            if let Some(notes) = &self.notes {
                match notes.ping().await {
                    Ok(()) => health().vault.set_healthy(),
                    Err(e) => health().vault.set_unhealthy(e.to_string()),
                }
            }

            let snapshot = metrics().snapshot();
            info!(
                received = snapshot.messages_received,
                enqueued = snapshot.items_enqueued,
                completed = snapshot.items_completed,
                degraded = snapshot.items_degraded,
                failed = snapshot.items_failed,
                recovered = snapshot.items_recovered,
                queue_depth = snapshot.queue_depth,
                in_flight = snapshot.in_flight,
                pipeline_mean_ms = snapshot.pipeline_latency_mean_ms,
                "Metrics snapshot"
            );
        }
    }
}
