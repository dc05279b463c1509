//! Partition result aggregation
//!
//! Merges per-partition outputs back into one result. The merge is strict:
//! partitions must cover ordinals 0..n exactly once, expose the same
//! feature keys, and agree on persistence-diagram shape. Any mismatch
//! aborts the merge rather than producing a silently incomplete result.

use crate::error::{EngineError, Result};
use graphtopo_core::PersistenceDiagram;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

/// Output of computing one partition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartitionResult {
    /// Position of the partition in the batch plan
    pub ordinal: usize,
    pub node_count: usize,
    pub edge_count: usize,
    /// Named feature vectors (one value per node of the partition)
    pub features: BTreeMap<String, Vec<f64>>,
    pub diagram: Option<PersistenceDiagram>,
    pub computation_time_ms: u64,
}

/// Merged output of all partitions of a request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatedResult {
    pub partition_count: usize,
    pub node_count: usize,
    pub edge_count: usize,
    /// Per feature key, one vector per partition in ordinal order
    pub features: BTreeMap<String, Vec<Vec<f64>>>,
    pub diagram: Option<PersistenceDiagram>,
    pub total_computation_time_ms: u64,
}

impl AggregatedResult {
    pub fn empty() -> Self {
        Self {
            partition_count: 0,
            node_count: 0,
            edge_count: 0,
            features: BTreeMap::new(),
            diagram: None,
            total_computation_time_ms: 0,
        }
    }
}

#[derive(Debug, Default)]
pub struct ResultAggregator;

impl ResultAggregator {
    pub fn new() -> Self {
        Self
    }

    pub fn aggregate(&self, mut partials: Vec<PartitionResult>) -> Result<AggregatedResult> {
        if partials.is_empty() {
            return Ok(AggregatedResult::empty());
        }

        partials.sort_by_key(|p| p.ordinal);
        for (expected, partial) in partials.iter().enumerate() {
            if partial.ordinal != expected {
                return Err(EngineError::Aggregation(format!(
                    "Partition ordinals must cover 0..{} exactly once, found {}",
                    partials.len(),
                    partial.ordinal
                )));
            }
        }

        let expected_keys: Vec<&String> = partials[0].features.keys().collect();
        for partial in &partials[1..] {
            let keys: Vec<&String> = partial.features.keys().collect();
            if keys != expected_keys {
                return Err(EngineError::Aggregation(format!(
                    "Partition {} reports feature keys {:?}, expected {:?}",
                    partial.ordinal, keys, expected_keys
                )));
            }
        }

        let mut result = AggregatedResult::empty();
        result.partition_count = partials.len();

        for partial in &partials {
            result.node_count += partial.node_count;
            result.edge_count += partial.edge_count;
            result.total_computation_time_ms += partial.computation_time_ms;

            for (key, values) in &partial.features {
                result
                    .features
                    .entry(key.clone())
                    .or_default()
                    .push(values.clone());
            }

            if let Some(partial_diagram) = &partial.diagram {
                match &mut result.diagram {
                    Some(merged) => merged
                        .extend(partial_diagram)
                        .map_err(EngineError::aggregation)?,
                    None => result.diagram = Some(partial_diagram.clone()),
                }
            }
        }

        info!(
            partitions = result.partition_count,
            nodes = result.node_count,
            total_ms = result.total_computation_time_ms,
            "Aggregated partition results"
        );
        Ok(result)
    }
}
