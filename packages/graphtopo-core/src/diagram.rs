use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};

/// One birth/death pair of a persistence diagram
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PersistencePair {
    pub dimension: u32,
    pub birth: f64,
    pub death: f64,
}

impl PersistencePair {
    pub fn new(dimension: u32, birth: f64, death: f64) -> Self {
        Self {
            dimension,
            birth,
            death,
        }
    }

    /// Lifetime of the feature (death - birth)
    pub fn persistence(&self) -> f64 {
        self.death - self.birth
    }
}

/// Row container for persistence-diagram output
///
/// The engine treats the numeric content opaquely but tracks the column
/// count so partial diagrams from different partitions can only be merged
/// when their shapes agree. Typical widths: 2 (birth, death) or
/// 3 (dimension, birth, death).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistenceDiagram {
    columns: usize,
    rows: Vec<Vec<f64>>,
}

impl PersistenceDiagram {
    pub fn new(columns: usize) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn from_pairs(pairs: &[PersistencePair]) -> Self {
        let rows = pairs
            .iter()
            .map(|p| vec![p.dimension as f64, p.birth, p.death])
            .collect();
        Self { columns: 3, rows }
    }

    pub fn push_row(&mut self, row: Vec<f64>) -> Result<()> {
        if row.len() != self.columns {
            return Err(CoreError::DiagramShape {
                expected: self.columns,
                got: row.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    /// Append all rows of `other`, requiring identical column counts
    pub fn extend(&mut self, other: &PersistenceDiagram) -> Result<()> {
        if other.columns != self.columns && !other.is_empty() {
            return Err(CoreError::DiagramShape {
                expected: self.columns,
                got: other.columns,
            });
        }
        self.rows.extend(other.rows.iter().cloned());
        Ok(())
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }
}
