//! Pre-flight resource guard
//!
//! Before committing to a computation the engine projects what fraction of
//! its memory ceiling would be in use if the estimate were admitted.
//! Below the warning threshold the work is admitted silently; between
//! warning and critical it is admitted after asking the cache to shed
//! expired entries; above critical it is admitted only if eviction brings
//! the projection back under, otherwise refused.

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use sysinfo::System;
use tracing::warn;

/// Source of current memory availability
pub trait MemoryTelemetry: Send + Sync {
    fn available_memory_bytes(&self) -> u64;
}

/// Live telemetry backed by the operating system
pub struct SystemTelemetry {
    system: Mutex<System>,
}

impl SystemTelemetry {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
        }
    }
}

impl Default for SystemTelemetry {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTelemetry for SystemTelemetry {
    fn available_memory_bytes(&self) -> u64 {
        let mut system = self.system.lock();
        system.refresh_memory();
        system.available_memory()
    }
}

/// What the guard saw when it made an admission decision
#[derive(Debug, Clone, Copy)]
pub struct ResourceSnapshot {
    pub available_bytes: u64,
    pub required_bytes: u64,
    /// Projected usage as a fraction of the ceiling, post-admission
    pub projected_fraction: f64,
}

pub struct ResourceGuard {
    telemetry: Arc<dyn MemoryTelemetry>,
    ceiling_bytes: u64,
    warning_fraction: f64,
    critical_fraction: f64,
    compute_timeout: Duration,
}

impl ResourceGuard {
    pub fn new(config: &EngineConfig, telemetry: Arc<dyn MemoryTelemetry>) -> Self {
        Self {
            telemetry,
            ceiling_bytes: config.memory_ceiling_bytes,
            warning_fraction: config.memory_warning_fraction,
            critical_fraction: config.memory_critical_fraction,
            compute_timeout: config.compute_timeout(),
        }
    }

    fn projection(&self, required_bytes: u64) -> ResourceSnapshot {
        let available = self.telemetry.available_memory_bytes();
        let used = self.ceiling_bytes.saturating_sub(available);
        let projected = (used.saturating_add(required_bytes)) as f64 / self.ceiling_bytes as f64;
        ResourceSnapshot {
            available_bytes: available,
            required_bytes,
            projected_fraction: projected,
        }
    }

    /// Decide whether an estimate may be admitted
    ///
    /// `relieve` is invoked at most once, only under pressure; it should
    /// free reclaimable memory (cache eviction) and return how many
    /// entries it dropped.
    pub fn admit<F: FnOnce() -> usize>(
        &self,
        required_bytes: u64,
        relieve: F,
    ) -> Result<ResourceSnapshot> {
        let snapshot = self.projection(required_bytes);
        if snapshot.projected_fraction < self.warning_fraction {
            return Ok(snapshot);
        }

        let evicted = relieve();
        if snapshot.projected_fraction < self.critical_fraction {
            warn!(
                projected = snapshot.projected_fraction,
                evicted, "Memory pressure warning, admitted after eviction"
            );
            return Ok(snapshot);
        }

        // Critical: only a re-measure after eviction can save the request
        let retaken = self.projection(required_bytes);
        if retaken.projected_fraction < self.critical_fraction {
            warn!(
                projected = retaken.projected_fraction,
                evicted, "Memory pressure relieved by eviction, admitted"
            );
            return Ok(retaken);
        }

        Err(EngineError::ResourceExhausted {
            required_bytes,
            projected: retaken.projected_fraction,
        })
    }

    /// Wrap a computation in the configured wall-clock deadline
    pub async fn run_with_timeout<T, Fut>(&self, fut: Fut) -> Result<T>
    where
        Fut: Future<Output = Result<T>>,
    {
        match tokio::time::timeout(self.compute_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(EngineError::TimeoutExceeded {
                deadline_ms: self.compute_timeout.as_millis() as u64,
            }),
        }
    }
}
