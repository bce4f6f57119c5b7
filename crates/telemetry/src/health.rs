//! Health check aggregation.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};

/// Health status for the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Degraded => "degraded",
            Self::Unhealthy => "unhealthy",
        }
    }

    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }

    pub fn is_serving(&self) -> bool {
        matches!(self, Self::Healthy | Self::Degraded)
    }
}

/// Component health state.
#[derive(Debug)]
pub struct ComponentHealth {
    name: &'static str,
    /// Whether the service can run at all without this component.
    critical: bool,
    healthy: AtomicBool,
    message: RwLock<Option<String>>,
    checked_at: RwLock<Option<DateTime<Utc>>>,
}

impl ComponentHealth {
    pub const fn new(name: &'static str, critical: bool) -> Self {
        Self {
            name,
            critical,
            healthy: AtomicBool::new(false),
            message: RwLock::new(None),
            checked_at: RwLock::new(None),
        }
    }

    pub fn set_healthy(&self) {
        self.healthy.store(true, Ordering::Relaxed);
        *self.message.write() = None;
        *self.checked_at.write() = Some(Utc::now());
    }

    pub fn set_unhealthy(&self, msg: impl Into<String>) {
        self.healthy.store(false, Ordering::Relaxed);
        *self.message.write() = Some(msg.into());
        *self.checked_at.write() = Some(Utc::now());
    }

    /// Record a check result in one call.
    pub fn record(&self, ok: bool, failure: impl Into<String>) {
        if ok {
            self.set_healthy();
        } else {
            self.set_unhealthy(failure);
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Relaxed)
    }

    pub fn is_critical(&self) -> bool {
        self.critical
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn message(&self) -> Option<String> {
        self.message.read().clone()
    }

    fn report(&self) -> ComponentHealthReport {
        ComponentHealthReport {
            name: self.name.to_string(),
            healthy: self.is_healthy(),
            critical: self.critical,
            message: self.message(),
            checked_at: *self.checked_at.read(),
        }
    }
}

/// Aggregated health status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub components: Vec<ComponentHealthReport>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealthReport {
    pub name: String,
    pub healthy: bool,
    pub critical: bool,
    pub message: Option<String>,
    pub checked_at: Option<DateTime<Utc>>,
}

/// Health registry for the queue store and the pipeline's collaborators.
pub struct HealthRegistry {
    /// Queue database. The receiver cannot accept messages without it.
    pub store: ComponentHealth,
    /// AI provider. Notes still get written with fallback analysis.
    pub ai: ComponentHealth,
    /// Note vault on disk.
    pub vault: ComponentHealth,
}

impl HealthRegistry {
    pub const fn new() -> Self {
        Self {
            store: ComponentHealth::new("store", true),
            ai: ComponentHealth::new("ai", false),
            vault: ComponentHealth::new("vault", false),
        }
    }

    fn components(&self) -> [&ComponentHealth; 3] {
        [&self.store, &self.ai, &self.vault]
    }

    /// Generate a health report.
    ///
    /// Unhealthy if any critical component is down, degraded if only
    /// non-critical ones are.
    pub fn report(&self) -> HealthReport {
        let components: Vec<ComponentHealthReport> =
            self.components().iter().map(|c| c.report()).collect();

        let critical_down = components.iter().any(|c| c.critical && !c.healthy);
        let any_down = components.iter().any(|c| !c.healthy);

        let status = if critical_down {
            HealthStatus::Unhealthy
        } else if any_down {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        };

        HealthReport { status, components }
    }

    /// Check if the service can accept traffic.
    pub fn is_ready(&self) -> bool {
        self.store.is_healthy()
    }

    /// Check if the service is alive.
    pub fn is_alive(&self) -> bool {
        true
    }
}

impl Default for HealthRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Global health registry.
pub static HEALTH: std::sync::LazyLock<HealthRegistry> =
    std::sync::LazyLock::new(HealthRegistry::new);

/// Get the global health registry.
pub fn health() -> &'static HealthRegistry {
    &HEALTH
}
