use crate::error::{CoreError, Result};
use petgraph::graph::{NodeIndex, UnGraph};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Stable external node identifier (survives subgraph extraction)
pub type NodeId = u64;

/// Undirected network graph with stable node ids
///
/// Wraps a petgraph `UnGraph` and keeps an id index so that callers can
/// address nodes by the identifiers the dataset uses, independent of
/// petgraph's internal indices. Subgraphs preserve the original ids.
#[derive(Debug, Clone)]
pub struct GraphData {
    graph: UnGraph<NodeId, f64>,
    index: HashMap<NodeId, NodeIndex>,
}

/// Serializable edge-list form of a graph (for request payloads)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphSpec {
    pub nodes: Vec<NodeId>,
    pub edges: Vec<(NodeId, NodeId)>,
}

impl GraphData {
    /// Build from an explicit node set plus edges
    ///
    /// Every edge endpoint must appear in `nodes`; isolated nodes are kept.
    pub fn from_nodes_and_edges(nodes: &[NodeId], edges: &[(NodeId, NodeId)]) -> Result<Self> {
        let mut graph = UnGraph::with_capacity(nodes.len(), edges.len());
        let mut index = HashMap::with_capacity(nodes.len());

        for &id in nodes {
            if index.contains_key(&id) {
                return Err(CoreError::GraphConstruction(format!(
                    "Duplicate node id: {}",
                    id
                )));
            }
            index.insert(id, graph.add_node(id));
        }

        for &(a, b) in edges {
            let (ia, ib) = match (index.get(&a), index.get(&b)) {
                (Some(&ia), Some(&ib)) => (ia, ib),
                _ => {
                    return Err(CoreError::GraphConstruction(format!(
                        "Edge ({}, {}) references unknown node",
                        a, b
                    )))
                }
            };
            graph.add_edge(ia, ib, 1.0);
        }

        Ok(Self { graph, index })
    }

    /// Build from an edge list, inferring the node set from endpoints
    pub fn from_edge_list(edges: &[(NodeId, NodeId)]) -> Result<Self> {
        let mut nodes: Vec<NodeId> = edges.iter().flat_map(|&(a, b)| [a, b]).collect();
        nodes.sort_unstable();
        nodes.dedup();
        Self::from_nodes_and_edges(&nodes, edges)
    }

    pub fn from_spec(spec: &GraphSpec) -> Result<Self> {
        Self::from_nodes_and_edges(&spec.nodes, &spec.edges)
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.index.contains_key(&id)
    }

    /// All node ids in ascending order
    pub fn node_ids(&self) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self.index.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Neighbor ids of a node in ascending order (empty if unknown)
    pub fn neighbors(&self, id: NodeId) -> Vec<NodeId> {
        match self.index.get(&id) {
            Some(&ix) => {
                let mut out: Vec<NodeId> =
                    self.graph.neighbors(ix).map(|n| self.graph[n]).collect();
                out.sort_unstable();
                out
            }
            None => Vec::new(),
        }
    }

    /// Normalized edge list: (min, max) pairs in ascending order
    pub fn edge_list(&self) -> Vec<(NodeId, NodeId)> {
        let mut edges: Vec<(NodeId, NodeId)> = self
            .graph
            .edge_indices()
            .filter_map(|e| self.graph.edge_endpoints(e))
            .map(|(a, b)| {
                let (a, b) = (self.graph[a], self.graph[b]);
                (a.min(b), a.max(b))
            })
            .collect();
        edges.sort_unstable();
        edges
    }

    /// Graph density in [0, 1] (0.0 for graphs with fewer than 2 nodes)
    pub fn density(&self) -> f64 {
        let n = self.graph.node_count();
        if n < 2 {
            return 0.0;
        }
        let max_edges = n * (n - 1) / 2;
        self.graph.edge_count() as f64 / max_edges as f64
    }

    /// Extract the induced subgraph over the given node ids
    ///
    /// Ids not present in the graph are rejected rather than silently
    /// dropped, so partition/subgraph bookkeeping stays exact.
    pub fn subgraph(&self, ids: &[NodeId]) -> Result<GraphData> {
        for &id in ids {
            if !self.index.contains_key(&id) {
                return Err(CoreError::GraphConstruction(format!(
                    "Subgraph references unknown node {}",
                    id
                )));
            }
        }

        let members: std::collections::HashSet<NodeId> = ids.iter().copied().collect();
        let edges: Vec<(NodeId, NodeId)> = self
            .edge_list()
            .into_iter()
            .filter(|(a, b)| members.contains(a) && members.contains(b))
            .collect();

        GraphData::from_nodes_and_edges(ids, &edges)
    }

    /// Syntactic memory footprint estimate in bytes
    ///
    /// Deliberately cheap: derived from node/edge counts only, never
    /// measured. Used by the engine's pre-flight resource check.
    pub fn estimated_size_bytes(&self) -> u64 {
        const NODE_BYTES: u64 = 64;
        const EDGE_BYTES: u64 = 32;
        self.graph.node_count() as u64 * NODE_BYTES + self.graph.edge_count() as u64 * EDGE_BYTES
    }
}
