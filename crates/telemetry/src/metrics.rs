//! Internal metrics collection.
//!
//! Process-local atomics. Snapshots are logged by the scheduler and served
//! on `/metrics`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// A counter metric.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_by(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// A gauge metric (can go up or down, never below zero).
#[derive(Debug, Default)]
pub struct Gauge(AtomicU64);

impl Gauge {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn set(&self, val: u64) {
        self.0.store(val, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dec(&self) {
        let _ = self
            .0
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| Some(v.saturating_sub(1)));
    }
}

/// Latency histogram in milliseconds.
///
/// Buckets run to a minute: AI and OCR calls are slow.
#[derive(Debug)]
pub struct Histogram {
    buckets: [AtomicU64; 11],
    sum: AtomicU64,
    count: AtomicU64,
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

impl Histogram {
    const BUCKET_BOUNDS: [u64; 11] = [
        10, 50, 100, 250, 500, 1_000, 2_500, 5_000, 10_000, 30_000, 60_000,
    ];

    pub fn new() -> Self {
        Self {
            buckets: Default::default(),
            sum: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    /// Records a value in milliseconds. Values past the last bound land in
    /// the last bucket.
    pub fn observe(&self, ms: u64) {
        self.sum.fetch_add(ms, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);

        let idx = Self::BUCKET_BOUNDS
            .iter()
            .position(|&bound| ms <= bound)
            .unwrap_or(Self::BUCKET_BOUNDS.len() - 1);
        self.buckets[idx].fetch_add(1, Ordering::Relaxed);
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn sum(&self) -> u64 {
        self.sum.load(Ordering::Relaxed)
    }

    pub fn mean(&self) -> f64 {
        let count = self.count();
        if count == 0 {
            0.0
        } else {
            self.sum() as f64 / count as f64
        }
    }

    /// Returns `(upper_bound_ms, count)` pairs.
    pub fn buckets(&self) -> Vec<(u64, u64)> {
        Self::BUCKET_BOUNDS
            .iter()
            .zip(self.buckets.iter())
            .map(|(&bound, count)| (bound, count.load(Ordering::Relaxed)))
            .collect()
    }
}

/// Collected metrics for the inbox engine.
#[derive(Debug, Default)]
pub struct Metrics {
    // Receiver
    pub messages_received: Counter,
    pub messages_rejected: Counter,
    pub items_enqueued: Counter,

    // Claiming
    pub items_claimed: Counter,
    pub claim_conflicts: Counter,

    // Outcomes
    pub items_completed: Counter,
    pub items_failed: Counter,
    pub items_degraded: Counter,
    pub finalize_conflicts: Counter,
    pub replies_sent: Counter,
    pub reply_errors: Counter,

    // Recovery and retry
    pub items_recovered: Counter,
    pub items_abandoned: Counter,
    pub items_retried: Counter,

    // Latency histograms
    pub receive_latency_ms: Histogram,
    pub pipeline_latency_ms: Histogram,
    pub resolve_latency_ms: Histogram,
    pub extract_latency_ms: Histogram,
    pub analyze_latency_ms: Histogram,
    pub materialize_latency_ms: Histogram,

    // Gauges
    pub in_flight: Gauge,
    pub queue_depth: Gauge,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latency histogram for a pipeline stage by its stable name.
    pub fn stage_latency(&self, stage: &str) -> Option<&Histogram> {
        match stage {
            "resolve_content" => Some(&self.resolve_latency_ms),
            "extract_text" => Some(&self.extract_latency_ms),
            "analyze" => Some(&self.analyze_latency_ms),
            "materialize" => Some(&self.materialize_latency_ms),
            _ => None,
        }
    }
}

/// A snapshot of metrics at a point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub timestamp: DateTime<Utc>,
    pub messages_received: u64,
    pub messages_rejected: u64,
    pub items_enqueued: u64,
    pub items_claimed: u64,
    pub claim_conflicts: u64,
    pub items_completed: u64,
    pub items_failed: u64,
    pub items_degraded: u64,
    pub finalize_conflicts: u64,
    pub items_recovered: u64,
    pub items_abandoned: u64,
    pub items_retried: u64,
    pub replies_sent: u64,
    pub reply_errors: u64,
    pub pipeline_latency_mean_ms: f64,
    pub analyze_latency_mean_ms: f64,
    pub in_flight: u64,
    pub queue_depth: u64,
}

impl Metrics {
    /// Takes a snapshot of current metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            timestamp: Utc::now(),
            messages_received: self.messages_received.get(),
            messages_rejected: self.messages_rejected.get(),
            items_enqueued: self.items_enqueued.get(),
            items_claimed: self.items_claimed.get(),
            claim_conflicts: self.claim_conflicts.get(),
            items_completed: self.items_completed.get(),
            items_failed: self.items_failed.get(),
            items_degraded: self.items_degraded.get(),
            finalize_conflicts: self.finalize_conflicts.get(),
            items_recovered: self.items_recovered.get(),
            items_abandoned: self.items_abandoned.get(),
            items_retried: self.items_retried.get(),
            replies_sent: self.replies_sent.get(),
            reply_errors: self.reply_errors.get(),
            pipeline_latency_mean_ms: self.pipeline_latency_ms.mean(),
            analyze_latency_mean_ms: self.analyze_latency_ms.mean(),
            in_flight: self.in_flight.get(),
            queue_depth: self.queue_depth.get(),
        }
    }
}

/// Global metrics registry.
pub static METRICS: std::sync::LazyLock<Metrics> = std::sync::LazyLock::new(Metrics::new);

/// Get the global metrics instance.
pub fn metrics() -> &'static Metrics {
    &METRICS
}
