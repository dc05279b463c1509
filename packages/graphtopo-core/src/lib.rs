/*
 * Graphtopo Core - Domain Model for Network Analytics
 *
 * Graph data structures, community detection, and analysis parameter
 * sets shared by the computation engine.
 *
 * Architecture:
 * - GraphData (petgraph-backed, stable u64 node ids)
 * - Community detection (deterministic label propagation)
 * - Metric capability set (enumerated, validated at request time)
 * - TDA parameter validation (range-checked)
 * - Persistence diagram containers (shape-aware for aggregation)
 */

// Public modules
pub mod community;
pub mod diagram;
pub mod error;
pub mod graph;
pub mod metric;
pub mod params;

// Re-exports
pub use community::{communities, connected_components};
pub use diagram::{PersistenceDiagram, PersistencePair};
pub use error::{CoreError, Result};
pub use graph::{GraphData, GraphSpec, NodeId};
pub use metric::MetricKind;
pub use params::{AnalysisParams, DistanceMetric, TdaParams};
