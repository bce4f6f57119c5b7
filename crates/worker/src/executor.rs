//! Runs the stage sequence over one claimed item.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use inbox_core::{ItemError, PipelineOutcome, QueueItem, StageKind};
use telemetry::metrics;
use tracing::{debug, warn};

use crate::config::ProcessorConfig;
use crate::stages::{PartialNote, Stage, StageError};

/// Executes stages in order and classifies their failures.
///
/// Resolve and materialize failures fail the item. Extraction failures
/// and, when the fallback policy is on, analysis failures are recorded as
/// degradations and the pipeline continues with the stage's fallback.
pub struct PipelineExecutor {
    stages: Vec<Box<dyn Stage>>,
    fallback_on_ai_error: bool,
    timeouts: HashMap<StageKind, Duration>,
}

impl PipelineExecutor {
    pub fn new(stages: Vec<Box<dyn Stage>>, config: &ProcessorConfig) -> Self {
        let timeouts = [
            StageKind::ResolveContent,
            StageKind::ExtractText,
            StageKind::Analyze,
            StageKind::Materialize,
        ]
        .into_iter()
        .map(|kind| (kind, config.stage_timeout(kind)))
        .collect();

        Self {
            stages,
            fallback_on_ai_error: config.fallback_on_ai_error,
            timeouts,
        }
    }

    /// Override one stage's timeout.
    pub fn with_stage_timeout(mut self, kind: StageKind, timeout: Duration) -> Self {
        self.timeouts.insert(kind, timeout);
        self
    }

    fn timeout_for(&self, kind: StageKind) -> Duration {
        self.timeouts
            .get(&kind)
            .copied()
            .unwrap_or(Duration::from_secs(60))
    }

    /// Whether a failure of `kind` ends the pipeline.
    pub fn is_terminal(&self, kind: StageKind) -> bool {
        kind.is_mandatory() || (kind == StageKind::Analyze && !self.fallback_on_ai_error)
    }

    /// Run every stage over `item`. Never touches the queue.
    pub async fn run(&self, item: &QueueItem) -> PipelineOutcome {
        let started = Instant::now();
        let mut partial = PartialNote::default();

        for stage in &self.stages {
            let kind = stage.kind();
            let snapshot = partial.clone();
            let stage_started = Instant::now();
            let limit = self.timeout_for(kind);

            let result = match tokio::time::timeout(limit, stage.apply(item, partial)).await {
                Ok(result) => result,
                Err(_) => Err(StageError::Timeout(limit)),
            };

            if let Some(histogram) = metrics().stage_latency(kind.as_str()) {
                histogram.observe(stage_started.elapsed().as_millis() as u64);
            }

            partial = match result {
                Ok(next) => {
                    debug!(item_id = %item.id, stage = kind.as_str(), "Stage complete");
                    next
                }
                Err(e) if self.is_terminal(kind) => {
                    warn!(item_id = %item.id, stage = kind.as_str(), error = %e, "Stage failed");
                    metrics()
                        .pipeline_latency_ms
                        .observe(started.elapsed().as_millis() as u64);
                    return PipelineOutcome::Failed(ItemError::new(kind, e.to_string()));
                }
                Err(e) => {
                    warn!(
                        item_id = %item.id,
                        stage = kind.as_str(),
                        error = %e,
                        "Stage degraded, continuing with fallback"
                    );
                    let mut recovered = stage.recover(item, snapshot);
                    recovered.degrade(kind, e.to_string());
                    recovered
                }
            };
        }

        metrics()
            .pipeline_latency_ms
            .observe(started.elapsed().as_millis() as u64);
        PipelineOutcome::Completed(partial.into_result())
    }
}
