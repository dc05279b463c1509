//! Analysis parameter sets with range validation
//!
//! Ranges mirror what the computation backends accept; a request with
//! out-of-range values is rejected before any resources are committed.

use crate::error::{CoreError, Result};
use crate::metric::MetricKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Distance metric used when building the filtration for TDA
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    Euclidean,
    Manhattan,
    Cosine,
}

impl DistanceMetric {
    pub fn as_str(&self) -> &'static str {
        match self {
            DistanceMetric::Euclidean => "euclidean",
            DistanceMetric::Manhattan => "manhattan",
            DistanceMetric::Cosine => "cosine",
        }
    }

    pub fn from_str(s: &str) -> Result<Self> {
        match s {
            "euclidean" => Ok(DistanceMetric::Euclidean),
            "manhattan" => Ok(DistanceMetric::Manhattan),
            "cosine" => Ok(DistanceMetric::Cosine),
            _ => Err(CoreError::InvalidParameter(format!(
                "Unsupported distance metric: {}",
                s
            ))),
        }
    }
}

/// Parameters for persistent-homology computation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TdaParams {
    /// Maximum edge length for the Vietoris-Rips filtration (0.1..=1.0)
    pub epsilon: f64,
    /// Minimum neighborhood size (5..=50)
    pub min_points: u32,
    /// Maximum homology dimension (2..=3)
    pub dimension: u32,
    /// Significance cutoff for persistence pairs (0.1..=0.9)
    pub persistence_threshold: f64,
    pub distance_metric: DistanceMetric,
}

impl Default for TdaParams {
    fn default() -> Self {
        Self {
            epsilon: 0.5,
            min_points: 15,
            dimension: 2,
            persistence_threshold: 0.3,
            distance_metric: DistanceMetric::Euclidean,
        }
    }
}

impl TdaParams {
    pub fn validate(&self) -> Result<()> {
        if !self.epsilon.is_finite() || !(0.1..=1.0).contains(&self.epsilon) {
            return Err(CoreError::InvalidParameter(format!(
                "epsilon must be between 0.1 and 1.0, got {}",
                self.epsilon
            )));
        }
        if !(5..=50).contains(&self.min_points) {
            return Err(CoreError::InvalidParameter(format!(
                "min_points must be between 5 and 50, got {}",
                self.min_points
            )));
        }
        if !(2..=3).contains(&self.dimension) {
            return Err(CoreError::InvalidParameter(format!(
                "dimension must be 2 or 3, got {}",
                self.dimension
            )));
        }
        if !self.persistence_threshold.is_finite()
            || !(0.1..=0.9).contains(&self.persistence_threshold)
        {
            return Err(CoreError::InvalidParameter(format!(
                "persistence_threshold must be between 0.1 and 0.9, got {}",
                self.persistence_threshold
            )));
        }
        Ok(())
    }
}

/// Full parameter set of an analysis request
///
/// `options` carries free-form, backend-specific knobs; they participate
/// in fingerprinting (key order does not matter) but not in validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisParams {
    pub metrics: Vec<MetricKind>,
    pub include_topology: bool,
    pub include_communities: bool,
    #[serde(default)]
    pub tda: Option<TdaParams>,
    #[serde(default)]
    pub options: BTreeMap<String, serde_json::Value>,
}

impl Default for AnalysisParams {
    fn default() -> Self {
        Self {
            metrics: vec![MetricKind::DegreeCentrality],
            include_topology: true,
            include_communities: true,
            tda: Some(TdaParams::default()),
            options: BTreeMap::new(),
        }
    }
}

impl AnalysisParams {
    pub fn validate(&self) -> Result<()> {
        if self.metrics.is_empty() && !self.include_topology && !self.include_communities {
            return Err(CoreError::InvalidParameter(
                "Request selects no metrics, topology, or communities".to_string(),
            ));
        }
        if self.include_topology {
            match &self.tda {
                Some(tda) => tda.validate()?,
                None => {
                    return Err(CoreError::InvalidParameter(
                        "include_topology requires tda parameters".to_string(),
                    ))
                }
            }
        }
        for value in self.options.values() {
            validate_json_value(value)?;
        }
        Ok(())
    }
}

/// Reject option values a canonical serialization cannot represent
fn validate_json_value(value: &serde_json::Value) -> Result<()> {
    match value {
        serde_json::Value::Number(n) => {
            if let Some(f) = n.as_f64() {
                if !f.is_finite() {
                    return Err(CoreError::InvalidParameter(
                        "Non-finite numeric option value".to_string(),
                    ));
                }
            }
            Ok(())
        }
        serde_json::Value::Array(items) => {
            for item in items {
                validate_json_value(item)?;
            }
            Ok(())
        }
        serde_json::Value::Object(map) => {
            for item in map.values() {
                validate_json_value(item)?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}
