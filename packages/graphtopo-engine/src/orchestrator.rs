//! Request orchestration
//!
//! Drives one request through the pipeline: validate, fingerprint, cache
//! lookup, resource admission, adaptive batch computation, aggregation,
//! cache write-back. Identical concurrent requests are single-flighted
//! through a per-fingerprint gate so the computation runs once and the
//! losers of the race read the winner's cached result.

use crate::aggregate::{AggregatedResult, PartitionResult, ResultAggregator};
use crate::cache::CacheStore;
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::fingerprint::{Fingerprint, FingerprintBuilder};
use crate::guard::{MemoryTelemetry, ResourceGuard, SystemTelemetry};
use crate::partition::{BatchPartitioner, Partition};
use crate::request::{ComputationRequest, Stage};
use async_trait::async_trait;
use dashmap::DashMap;
use futures::stream::StreamExt;
use graphtopo_core::{AnalysisParams, GraphData};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// Computation backend invoked once per partition
#[async_trait]
pub trait ComputeFn: Send + Sync {
    async fn compute(
        &self,
        partition: &Partition,
        data: &GraphData,
        params: &AnalysisParams,
    ) -> Result<PartitionResult>;
}

/// Failure annotated with where in the pipeline it happened
#[derive(Debug, thiserror::Error)]
#[error("Request {request_id} failed at stage {stage}: {source}")]
pub struct ExecutionError {
    pub stage: Stage,
    pub request_id: Uuid,
    pub fingerprint: Option<Fingerprint>,
    #[source]
    pub source: EngineError,
}

/// Successful pipeline output
#[derive(Debug, Clone)]
pub struct ComputationOutcome {
    pub request_id: Uuid,
    pub fingerprint: Fingerprint,
    pub cache_hit: bool,
    pub result: AggregatedResult,
}

pub struct ComputationOrchestrator {
    config: EngineConfig,
    fingerprints: FingerprintBuilder,
    cache: Arc<CacheStore>,
    guard: ResourceGuard,
    partitioner: BatchPartitioner,
    aggregator: ResultAggregator,
    compute: Arc<dyn ComputeFn>,
    inflight: DashMap<Fingerprint, Arc<tokio::sync::Mutex<()>>>,
}

impl ComputationOrchestrator {
    /// Orchestrator with live system telemetry and a standalone cache
    pub fn new(config: EngineConfig, compute: Arc<dyn ComputeFn>) -> Result<Self> {
        let cache = Arc::new(CacheStore::new(&config));
        Self::with_parts(config, compute, cache, Arc::new(SystemTelemetry::new()))
    }

    /// Orchestrator over an explicit cache and telemetry source
    pub fn with_parts(
        config: EngineConfig,
        compute: Arc<dyn ComputeFn>,
        cache: Arc<CacheStore>,
        telemetry: Arc<dyn MemoryTelemetry>,
    ) -> Result<Self> {
        config.validate()?;
        let guard = ResourceGuard::new(&config, telemetry);
        Ok(Self {
            config,
            fingerprints: FingerprintBuilder::new(),
            cache,
            guard,
            partitioner: BatchPartitioner::new(),
            aggregator: ResultAggregator::new(),
            compute,
            inflight: DashMap::new(),
        })
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    pub async fn execute(
        &self,
        request: ComputationRequest,
    ) -> std::result::Result<ComputationOutcome, ExecutionError> {
        let request_id = request.id;
        let fail = |stage, fingerprint, source| ExecutionError {
            stage,
            request_id,
            fingerprint,
            source,
        };

        request
            .params
            .validate()
            .map_err(|e| fail(Stage::Received, None, e.into()))?;

        let fingerprint = self
            .fingerprints
            .fingerprint(&request.dataset_id, &request.graph, &request.params)
            .map_err(|e| fail(Stage::Fingerprinted, None, e))?;

        if request.cache_eligible {
            if let Some(result) = self.cache.get(&fingerprint).await {
                info!(
                    request_id = %request_id,
                    fingerprint = %fingerprint,
                    stage = %Stage::CacheChecked,
                    "Cache hit"
                );
                return Ok(ComputationOutcome {
                    request_id,
                    fingerprint,
                    cache_hit: true,
                    result,
                });
            }
        }

        // Single flight: identical concurrent requests line up here and
        // re-check the cache once the winner finishes
        let gate = self
            .inflight
            .entry(fingerprint)
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone();
        let permit = gate.lock().await;

        let outcome = self.run_pipeline(&request, fingerprint).await;

        // Drop our own handle first so the strong count reflects only the
        // map entry plus any still-waiting requests
        drop(permit);
        drop(gate);
        self.inflight
            .remove_if(&fingerprint, |_, gate| Arc::strong_count(gate) <= 1);

        outcome
    }

    async fn run_pipeline(
        &self,
        request: &ComputationRequest,
        fingerprint: Fingerprint,
    ) -> std::result::Result<ComputationOutcome, ExecutionError> {
        let request_id = request.id;
        let fail = |stage, source| ExecutionError {
            stage,
            request_id,
            fingerprint: Some(fingerprint),
            source,
        };

        if request.cache_eligible {
            if let Some(result) = self.cache.get(&fingerprint).await {
                debug!(
                    request_id = %request_id,
                    fingerprint = %fingerprint,
                    "Cache hit after waiting on identical request"
                );
                return Ok(ComputationOutcome {
                    request_id,
                    fingerprint,
                    cache_hit: true,
                    result,
                });
            }
        }

        let snapshot = self
            .guard
            .admit(request.graph.estimated_size_bytes(), || {
                self.cache.evict_expired()
            })
            .map_err(|e| fail(Stage::GuardChecked, e))?;
        debug!(
            request_id = %request_id,
            projected = snapshot.projected_fraction,
            stage = %Stage::GuardChecked,
            "Resource admission granted"
        );

        let target = request.batch_target.unwrap_or(self.config.batch_target);
        let partials = self
            .partitioner
            .run_adaptive(
                &request.graph,
                target,
                self.config.max_batch_reductions,
                |partitions| self.run_batch(partitions, request),
            )
            .await
            .map_err(|e| {
                // Bad partitioning input is a planning failure, not a
                // compute failure
                let stage = if matches!(e, EngineError::InvalidParameter(_)) {
                    Stage::Partitioned
                } else {
                    Stage::Computing
                };
                fail(stage, e)
            })?;

        let result = self
            .aggregator
            .aggregate(partials)
            .map_err(|e| fail(Stage::Aggregated, e))?;

        if request.cache_eligible {
            self.cache.put(fingerprint, result.clone()).await;
            debug!(
                request_id = %request_id,
                fingerprint = %fingerprint,
                stage = %Stage::Cached,
                "Result cached"
            );
        }

        info!(
            request_id = %request_id,
            fingerprint = %fingerprint,
            nodes = result.node_count,
            partitions = result.partition_count,
            stage = %Stage::Done,
            "Request complete"
        );
        Ok(ComputationOutcome {
            request_id,
            fingerprint,
            cache_hit: false,
            result,
        })
    }

    /// Compute all partitions of one plan with bounded concurrency,
    /// each under the configured deadline
    async fn run_batch(
        &self,
        partitions: Vec<Partition>,
        request: &ComputationRequest,
    ) -> Result<Vec<PartitionResult>> {
        debug!(
            request_id = %request.id,
            partitions = partitions.len(),
            stage = %Stage::Computing,
            "Running batch plan"
        );

        let tasks = partitions.into_iter().map(|partition| {
            let graph = Arc::clone(&request.graph);
            async move {
                let data = graph.subgraph(&partition.nodes)?;
                self.guard
                    .run_with_timeout(self.compute.compute(&partition, &data, &request.params))
                    .await
            }
        });

        let results: Vec<Result<PartitionResult>> = futures::stream::iter(tasks)
            .buffered(self.config.compute_concurrency)
            .collect()
            .await;
        results.into_iter().collect()
    }
}
