use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Unsupported metric: {0}")]
    UnknownMetric(String),

    #[error("Graph construction error: {0}")]
    GraphConstruction(String),

    #[error("Diagram shape mismatch: expected {expected} columns, got {got}")]
    DiagramShape { expected: usize, got: usize },
}

impl CoreError {
    pub fn invalid_parameter<E: std::fmt::Display>(e: E) -> Self {
        Self::InvalidParameter(e.to_string())
    }
}
