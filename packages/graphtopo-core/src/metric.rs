use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};

/// Enumerated metric capability set
///
/// Requests name metrics against this closed set; unknown names are
/// rejected up front instead of being dispatched by string lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    BetweennessCentrality,
    EigenvectorCentrality,
    ClusteringCoefficient,
    DegreeCentrality,
    ClosenessCentrality,
}

impl MetricKind {
    pub const ALL: [MetricKind; 5] = [
        MetricKind::BetweennessCentrality,
        MetricKind::EigenvectorCentrality,
        MetricKind::ClusteringCoefficient,
        MetricKind::DegreeCentrality,
        MetricKind::ClosenessCentrality,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::BetweennessCentrality => "betweenness_centrality",
            MetricKind::EigenvectorCentrality => "eigenvector_centrality",
            MetricKind::ClusteringCoefficient => "clustering_coefficient",
            MetricKind::DegreeCentrality => "degree_centrality",
            MetricKind::ClosenessCentrality => "closeness_centrality",
        }
    }

    pub fn from_str(s: &str) -> Result<Self> {
        match s {
            "betweenness_centrality" => Ok(MetricKind::BetweennessCentrality),
            "eigenvector_centrality" => Ok(MetricKind::EigenvectorCentrality),
            "clustering_coefficient" => Ok(MetricKind::ClusteringCoefficient),
            "degree_centrality" => Ok(MetricKind::DegreeCentrality),
            "closeness_centrality" => Ok(MetricKind::ClosenessCentrality),
            _ => Err(CoreError::UnknownMetric(s.to_string())),
        }
    }
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_kind_roundtrip() {
        for kind in &MetricKind::ALL {
            let s = kind.as_str();
            let parsed = MetricKind::from_str(s).unwrap();
            assert_eq!(*kind, parsed);
        }
    }

    #[test]
    fn test_metric_kind_unknown_rejected() {
        assert!(MetricKind::from_str("pagerank").is_err());
        assert!(MetricKind::from_str("").is_err());
    }

    #[test]
    fn test_metric_kind_serde_snake_case() {
        let json = serde_json::to_string(&MetricKind::DegreeCentrality).unwrap();
        assert_eq!(json, "\"degree_centrality\"");
    }
}
