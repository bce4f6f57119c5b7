//! Processor configuration.

use std::time::Duration;

use inbox_core::limits::DEFAULT_MAX_ANALYSIS_CHARS;
use inbox_core::StageKind;
use serde::{Deserialize, Serialize};

/// Processor configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessorConfig {
    /// Run the scheduled processor inside `serve`
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Pending items read per run
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Items processed concurrently within a run
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Seconds between scheduled runs
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Processing items untouched this long are considered abandoned
    #[serde(default = "default_stale_after_secs")]
    pub stale_after_secs: u64,
    /// Claims allowed before recovery gives up on an item
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Run staleness recovery on every scheduler tick
    #[serde(default)]
    pub auto_recover: bool,
    /// Complete items with a fallback analysis when the AI provider fails
    #[serde(default = "default_true")]
    pub fallback_on_ai_error: bool,
    /// Chars of content sent to the AI provider
    #[serde(default = "default_max_analysis_chars")]
    pub max_analysis_chars: usize,
    /// Per-stage timeouts in seconds
    #[serde(default = "default_resolve_timeout_secs")]
    pub resolve_timeout_secs: u64,
    #[serde(default = "default_extract_timeout_secs")]
    pub extract_timeout_secs: u64,
    #[serde(default = "default_analyze_timeout_secs")]
    pub analyze_timeout_secs: u64,
    #[serde(default = "default_materialize_timeout_secs")]
    pub materialize_timeout_secs: u64,
    /// Seconds between metrics snapshot logs and health probes
    #[serde(default = "default_metrics_interval_secs")]
    pub metrics_interval_secs: u64,
}

fn default_true() -> bool {
    true
}

fn default_batch_size() -> usize {
    20
}

fn default_concurrency() -> usize {
    4
}

fn default_poll_interval_secs() -> u64 {
    10
}

fn default_stale_after_secs() -> u64 {
    600
}

fn default_max_attempts() -> u32 {
    3
}

fn default_max_analysis_chars() -> usize {
    DEFAULT_MAX_ANALYSIS_CHARS
}

fn default_resolve_timeout_secs() -> u64 {
    60
}

fn default_extract_timeout_secs() -> u64 {
    120
}

fn default_analyze_timeout_secs() -> u64 {
    180
}

fn default_materialize_timeout_secs() -> u64 {
    30
}

fn default_metrics_interval_secs() -> u64 {
    60
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            batch_size: default_batch_size(),
            concurrency: default_concurrency(),
            poll_interval_secs: default_poll_interval_secs(),
            stale_after_secs: default_stale_after_secs(),
            max_attempts: default_max_attempts(),
            auto_recover: false,
            fallback_on_ai_error: true,
            max_analysis_chars: default_max_analysis_chars(),
            resolve_timeout_secs: default_resolve_timeout_secs(),
            extract_timeout_secs: default_extract_timeout_secs(),
            analyze_timeout_secs: default_analyze_timeout_secs(),
            materialize_timeout_secs: default_materialize_timeout_secs(),
            metrics_interval_secs: default_metrics_interval_secs(),
        }
    }
}

impl ProcessorConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.stale_after_secs)
    }

    pub fn metrics_interval(&self) -> Duration {
        Duration::from_secs(self.metrics_interval_secs.max(1))
    }

    /// Timeout applied to one stage invocation.
    pub fn stage_timeout(&self, stage: StageKind) -> Duration {
        let secs = match stage {
            StageKind::ResolveContent => self.resolve_timeout_secs,
            StageKind::ExtractText => self.extract_timeout_secs,
            StageKind::Analyze => self.analyze_timeout_secs,
            StageKind::Materialize | StageKind::Recovery => self.materialize_timeout_secs,
        };
        Duration::from_secs(secs)
    }
}
