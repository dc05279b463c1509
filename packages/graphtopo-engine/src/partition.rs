//! Community-respecting batch partitioning with adaptive sizing
//!
//! Partitions are built by packing whole communities up to a node-count
//! target, so locality-sensitive algorithms see coherent neighborhoods.
//! A community larger than the target is split into target-sized chunks.
//! When a batch run fails under memory pressure the target is halved and
//! the whole plan is rebuilt, up to a fixed reduction ceiling.

use crate::aggregate::PartitionResult;
use crate::error::{EngineError, Result};
use graphtopo_core::{communities, GraphData, NodeId};
use serde::{Deserialize, Serialize};
use std::future::Future;
use tracing::{info, warn};

/// One planned batch: a set of node ids to compute together
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partition {
    pub ordinal: usize,
    pub nodes: Vec<NodeId>,
}

impl Partition {
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct BatchPartitioner;

impl BatchPartitioner {
    pub fn new() -> Self {
        Self
    }

    /// Plan partitions of at most `target` nodes each
    ///
    /// Graphs at or under the target yield a single partition without
    /// running community detection. The returned partitions cover every
    /// node exactly once, in ordinal order.
    pub fn partition(&self, graph: &GraphData, target: usize) -> Result<Vec<Partition>> {
        if target == 0 {
            return Err(EngineError::InvalidParameter(
                "Partition target must be positive".to_string(),
            ));
        }
        if graph.is_empty() {
            return Ok(Vec::new());
        }
        if graph.node_count() <= target {
            return Ok(vec![Partition {
                ordinal: 0,
                nodes: graph.node_ids(),
            }]);
        }

        let groups = communities(graph);

        // Chunk oversized communities, then greedily pack whole groups
        let mut partitions: Vec<Partition> = Vec::new();
        let mut current: Vec<NodeId> = Vec::with_capacity(target);

        for group in groups {
            for chunk in group.chunks(target) {
                if current.len() + chunk.len() > target && !current.is_empty() {
                    partitions.push(Partition {
                        ordinal: partitions.len(),
                        nodes: std::mem::take(&mut current),
                    });
                }
                current.extend_from_slice(chunk);
            }
        }
        if !current.is_empty() {
            partitions.push(Partition {
                ordinal: partitions.len(),
                nodes: current,
            });
        }

        info!(
            nodes = graph.node_count(),
            target,
            partitions = partitions.len(),
            "Planned batch partitions"
        );
        Ok(partitions)
    }

    /// Run a batch plan, halving the target on memory pressure
    ///
    /// `run` receives a fresh plan per attempt. Failures that are not
    /// memory-related propagate immediately; memory-related failures
    /// trigger a replan at half the target, at most `max_reductions`
    /// times before the run is abandoned.
    pub async fn run_adaptive<F, Fut>(
        &self,
        graph: &GraphData,
        initial_target: usize,
        max_reductions: u32,
        run: F,
    ) -> Result<Vec<PartitionResult>>
    where
        F: Fn(Vec<Partition>) -> Fut,
        Fut: Future<Output = Result<Vec<PartitionResult>>>,
    {
        let mut target = initial_target;
        let mut reductions = 0u32;

        loop {
            let partitions = self.partition(graph, target)?;
            match run(partitions).await {
                Ok(results) => return Ok(results),
                Err(e) if is_memory_pressure(&e) => {
                    if reductions >= max_reductions {
                        warn!(
                            reductions,
                            final_target = target,
                            "Batch run abandoned, reduction ceiling reached"
                        );
                        return Err(EngineError::BatchProcessingFailed {
                            reductions,
                            final_target: target,
                        });
                    }
                    reductions += 1;
                    target = (target / 2).max(1);
                    warn!(
                        error = %e,
                        attempt = reductions,
                        new_target = target,
                        "Batch run hit memory pressure, halving target"
                    );
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn is_memory_pressure(e: &EngineError) -> bool {
    matches!(
        e,
        EngineError::OutOfMemory(_) | EngineError::ResourceExhausted { .. }
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn isolated_nodes(n: u64) -> GraphData {
        let nodes: Vec<NodeId> = (0..n).collect();
        GraphData::from_nodes_and_edges(&nodes, &[]).unwrap()
    }

    fn dummy_results(partitions: &[Partition]) -> Vec<PartitionResult> {
        partitions
            .iter()
            .map(|p| PartitionResult {
                ordinal: p.ordinal,
                node_count: p.len(),
                edge_count: 0,
                features: BTreeMap::new(),
                diagram: None,
                computation_time_ms: 1,
            })
            .collect()
    }

    #[test]
    fn test_small_graph_single_partition() {
        let g = isolated_nodes(10);
        let parts = BatchPartitioner::new().partition(&g, 1000).unwrap();
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].len(), 10);
    }

    #[test]
    fn test_partition_sizes_2500_nodes_target_1000() {
        let g = isolated_nodes(2500);
        let parts = BatchPartitioner::new().partition(&g, 1000).unwrap();

        let sizes: Vec<usize> = parts.iter().map(Partition::len).collect();
        assert_eq!(sizes, vec![1000, 1000, 500]);
        assert_eq!(parts[2].ordinal, 2);
    }

    #[test]
    fn test_partitions_cover_all_nodes_exactly_once() {
        let g = isolated_nodes(2500);
        let parts = BatchPartitioner::new().partition(&g, 700).unwrap();

        let mut all: Vec<NodeId> = parts.iter().flat_map(|p| p.nodes.clone()).collect();
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), 2500);
    }

    #[test]
    fn test_communities_kept_together() {
        // Two tight cliques; target fits either whole but not both
        let g = GraphData::from_edge_list(&[
            (1, 2),
            (2, 3),
            (1, 3),
            (10, 11),
            (11, 12),
            (10, 12),
        ])
        .unwrap();
        let parts = BatchPartitioner::new().partition(&g, 4).unwrap();

        for part in &parts {
            let in_first = part.nodes.iter().filter(|&&n| n < 10).count();
            let in_second = part.nodes.iter().filter(|&&n| n >= 10).count();
            // A partition may host both full cliques only if it fits both;
            // it must never split one clique across partitions
            assert!(in_first == 0 || in_first == 3);
            assert!(in_second == 0 || in_second == 3);
        }
    }

    #[test]
    fn test_oversized_community_chunked() {
        // A path graph converges to few labels; chunks cap partition size
        let edges: Vec<(NodeId, NodeId)> = (0..99u64).map(|i| (i, i + 1)).collect();
        let g = GraphData::from_edge_list(&edges).unwrap();
        let parts = BatchPartitioner::new().partition(&g, 25).unwrap();

        assert!(parts.iter().all(|p| p.len() <= 25));
        let total: usize = parts.iter().map(Partition::len).sum();
        assert_eq!(total, 100);
    }

    proptest::proptest! {
        #[test]
        fn prop_partitions_cover_once_and_respect_target(
            n in 1u64..400,
            target in 1usize..100,
        ) {
            let g = isolated_nodes(n);
            let parts = BatchPartitioner::new().partition(&g, target).unwrap();

            let mut all: Vec<NodeId> = parts.iter().flat_map(|p| p.nodes.clone()).collect();
            all.sort_unstable();
            proptest::prop_assert_eq!(all, g.node_ids());
            proptest::prop_assert!(parts.iter().all(|p| p.len() <= target));
        }
    }

    #[test]
    fn test_zero_target_rejected() {
        let g = isolated_nodes(5);
        assert!(BatchPartitioner::new().partition(&g, 0).is_err());
    }

    #[test]
    fn test_empty_graph_empty_plan() {
        let g = GraphData::from_nodes_and_edges(&[], &[]).unwrap();
        assert!(BatchPartitioner::new().partition(&g, 100).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_adaptive_succeeds_after_halving() {
        let g = isolated_nodes(1000);
        let partitioner = BatchPartitioner::new();
        let attempts = AtomicU32::new(0);

        let results = partitioner
            .run_adaptive(&g, 1000, 3, |partitions| {
                let attempt = attempts.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt < 2 {
                        Err(EngineError::OutOfMemory("partition too large".into()))
                    } else {
                        // Third attempt runs at target 250
                        assert!(partitions.iter().all(|p| p.len() <= 250));
                        Ok(dummy_results(&partitions))
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        let total: usize = results.iter().map(|r| r.node_count).sum();
        assert_eq!(total, 1000);
    }

    #[tokio::test]
    async fn test_adaptive_gives_up_after_max_reductions() {
        let g = isolated_nodes(1000);
        let partitioner = BatchPartitioner::new();
        let attempts = AtomicU32::new(0);

        let err = partitioner
            .run_adaptive(&g, 1000, 3, |_partitions| {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Err(EngineError::OutOfMemory("still too large".into())) }
            })
            .await
            .unwrap_err();

        // Initial attempt plus 3 reductions
        assert_eq!(attempts.load(Ordering::SeqCst), 4);
        match err {
            EngineError::BatchProcessingFailed {
                reductions,
                final_target,
            } => {
                assert_eq!(reductions, 3);
                assert_eq!(final_target, 125);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_adaptive_passes_through_permanent_errors() {
        let g = isolated_nodes(100);
        let partitioner = BatchPartitioner::new();
        let attempts = AtomicU32::new(0);

        let err = partitioner
            .run_adaptive(&g, 50, 3, |_partitions| {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Err(EngineError::Compute("bad algorithm input".into())) }
            })
            .await
            .unwrap_err();

        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert!(matches!(err, EngineError::Compute(_)));
    }
}
