use graphtopo_core::{AnalysisParams, GraphData};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// One analysis request as submitted to the orchestrator
///
/// The graph is shared behind an `Arc` so partition fan-out never clones
/// the full structure. `cache_eligible` lets callers force a fresh
/// computation; ineligible requests neither read nor write the cache.
#[derive(Debug, Clone)]
pub struct ComputationRequest {
    pub id: Uuid,
    pub dataset_id: String,
    pub graph: Arc<GraphData>,
    pub params: AnalysisParams,
    pub cache_eligible: bool,
    /// Override of the configured initial partition target
    pub batch_target: Option<usize>,
}

impl ComputationRequest {
    pub fn new(dataset_id: impl Into<String>, graph: Arc<GraphData>, params: AnalysisParams) -> Self {
        Self {
            id: Uuid::new_v4(),
            dataset_id: dataset_id.into(),
            graph,
            params,
            cache_eligible: true,
            batch_target: None,
        }
    }

    pub fn bypass_cache(mut self) -> Self {
        self.cache_eligible = false;
        self
    }

    pub fn with_batch_target(mut self, target: usize) -> Self {
        self.batch_target = Some(target);
        self
    }
}

/// Pipeline stage a request is in, recorded on progress and on failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Received,
    Fingerprinted,
    CacheChecked,
    GuardChecked,
    Partitioned,
    Computing,
    Aggregated,
    Cached,
    Done,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Received => "received",
            Stage::Fingerprinted => "fingerprinted",
            Stage::CacheChecked => "cache_checked",
            Stage::GuardChecked => "guard_checked",
            Stage::Partitioned => "partitioned",
            Stage::Computing => "computing",
            Stage::Aggregated => "aggregated",
            Stage::Cached => "cached",
            Stage::Done => "done",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
