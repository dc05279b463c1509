/*
 * GraphTopo Engine
 *
 * Memory-aware batch orchestration for graph and topology analytics.
 *
 * Modules:
 * - config: engine tuning knobs and defaults
 * - error: engine error taxonomy with retry categories
 * - fingerprint: content-addressed request identity (blake3)
 * - cache: TTL result cache with generational eviction and backend tier
 * - guard: pre-flight memory admission and computation deadlines
 * - partition: community-respecting batch planning with adaptive sizing
 * - aggregate: strict merge of per-partition results
 * - request: request envelope and pipeline stages
 * - orchestrator: the pipeline driver with single-flight deduplication
 */

pub mod aggregate;
pub mod cache;
pub mod config;
pub mod error;
pub mod fingerprint;
pub mod guard;
pub mod orchestrator;
pub mod partition;
pub mod request;

pub use aggregate::{AggregatedResult, PartitionResult, ResultAggregator};
pub use cache::{CacheBackend, CacheStats, CacheStore, MemoryBackend};
pub use config::EngineConfig;
pub use error::{EngineError, ErrorCategory, Result};
pub use fingerprint::{Fingerprint, FingerprintBuilder};
pub use guard::{MemoryTelemetry, ResourceGuard, ResourceSnapshot, SystemTelemetry};
pub use orchestrator::{ComputationOrchestrator, ComputationOutcome, ComputeFn, ExecutionError};
pub use partition::{BatchPartitioner, Partition};
pub use request::{ComputationRequest, Stage};

/// Install the process-wide tracing subscriber, filtered by `RUST_LOG`
///
/// Safe to call more than once; later calls are no-ops.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
}
