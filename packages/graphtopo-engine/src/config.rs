//! Engine configuration
//!
//! Defaults match production tuning; every knob can be overridden per
//! deployment. `validate` runs once at engine construction so bad values
//! fail fast instead of surfacing mid-request.

use crate::error::{EngineError, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CACHE_CAPACITY: usize = 1000;
pub const DEFAULT_CACHE_TTL_SECONDS: u64 = 3600;
pub const DEFAULT_BATCH_TARGET: usize = 1000;
pub const DEFAULT_MAX_BATCH_REDUCTIONS: u32 = 3;
pub const DEFAULT_MEMORY_WARNING_FRACTION: f64 = 0.70;
pub const DEFAULT_MEMORY_CRITICAL_FRACTION: f64 = 0.85;
pub const DEFAULT_MEMORY_CEILING_BYTES: u64 = 4 * 1024 * 1024 * 1024;
pub const DEFAULT_COMPUTE_TIMEOUT_SECONDS: u64 = 300;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum number of cached results before eviction kicks in
    pub cache_capacity: usize,
    /// Time-to-live applied to every cache entry
    pub cache_ttl_seconds: u64,
    /// Initial partition target size in nodes
    pub batch_target: usize,
    /// How many times the partitioner may halve the target before giving up
    pub max_batch_reductions: u32,
    /// Projected-usage fraction above which eviction is attempted
    pub memory_warning_fraction: f64,
    /// Projected-usage fraction above which admission is refused
    pub memory_critical_fraction: f64,
    /// Memory budget the projection is measured against
    pub memory_ceiling_bytes: u64,
    /// Wall-clock deadline for a single partition computation
    pub compute_timeout_seconds: u64,
    /// Concurrent partition computations in flight
    pub compute_concurrency: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            cache_ttl_seconds: DEFAULT_CACHE_TTL_SECONDS,
            batch_target: DEFAULT_BATCH_TARGET,
            max_batch_reductions: DEFAULT_MAX_BATCH_REDUCTIONS,
            memory_warning_fraction: DEFAULT_MEMORY_WARNING_FRACTION,
            memory_critical_fraction: DEFAULT_MEMORY_CRITICAL_FRACTION,
            memory_ceiling_bytes: DEFAULT_MEMORY_CEILING_BYTES,
            compute_timeout_seconds: DEFAULT_COMPUTE_TIMEOUT_SECONDS,
            compute_concurrency: default_concurrency(),
        }
    }
}

fn default_concurrency() -> usize {
    (num_cpus::get() * 3 / 4).max(1)
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.cache_capacity == 0 {
            return Err(EngineError::InvalidParameter(
                "cache_capacity must be positive".to_string(),
            ));
        }
        if self.batch_target == 0 {
            return Err(EngineError::InvalidParameter(
                "batch_target must be positive".to_string(),
            ));
        }
        if self.compute_concurrency == 0 {
            return Err(EngineError::InvalidParameter(
                "compute_concurrency must be positive".to_string(),
            ));
        }
        if self.memory_ceiling_bytes == 0 {
            return Err(EngineError::InvalidParameter(
                "memory_ceiling_bytes must be positive".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&self.memory_warning_fraction)
            || !(0.0..1.0).contains(&self.memory_critical_fraction)
        {
            return Err(EngineError::InvalidParameter(
                "memory fractions must be in [0, 1)".to_string(),
            ));
        }
        if self.memory_warning_fraction >= self.memory_critical_fraction {
            return Err(EngineError::InvalidParameter(format!(
                "warning fraction {} must be below critical fraction {}",
                self.memory_warning_fraction, self.memory_critical_fraction
            )));
        }
        Ok(())
    }

    pub fn compute_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.compute_timeout_seconds)
    }
}
