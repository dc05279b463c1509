use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Resource exhausted: estimate {required_bytes} bytes would push projected memory usage to {projected:.2} of ceiling")]
    ResourceExhausted { required_bytes: u64, projected: f64 },

    #[error("Computation exceeded deadline of {deadline_ms} ms")]
    TimeoutExceeded { deadline_ms: u64 },

    #[error("Batch processing failed after {reductions} batch-size reductions (final target {final_target})")]
    BatchProcessingFailed {
        reductions: u32,
        final_target: usize,
    },

    #[error("Aggregation error: {0}")]
    Aggregation(String),

    #[error("Cache backend error: {0}")]
    Cache(String),

    #[error("Computation out of memory: {0}")]
    OutOfMemory(String),

    #[error("Computation failed: {0}")]
    Compute(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<graphtopo_core::CoreError> for EngineError {
    fn from(e: graphtopo_core::CoreError) -> Self {
        EngineError::InvalidParameter(e.to_string())
    }
}

impl EngineError {
    pub fn cache<E: std::fmt::Display>(e: E) -> Self {
        Self::Cache(e.to_string())
    }

    pub fn aggregation<E: std::fmt::Display>(e: E) -> Self {
        Self::Aggregation(e.to_string())
    }

    /// Out-of-memory signals drive the partitioner's adaptive retry
    pub fn is_out_of_memory(&self) -> bool {
        matches!(self, EngineError::OutOfMemory(_))
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            EngineError::InvalidParameter(_)
            | EngineError::Aggregation(_)
            | EngineError::Compute(_) => ErrorCategory::Permanent,
            EngineError::ResourceExhausted { .. }
            | EngineError::TimeoutExceeded { .. }
            | EngineError::Cache(_) => ErrorCategory::Transient,
            EngineError::BatchProcessingFailed { .. } | EngineError::OutOfMemory(_) => {
                ErrorCategory::Infrastructure
            }
            EngineError::Other(_) => ErrorCategory::Transient,
        }
    }
}

/// Error category for caller-side retry policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ErrorCategory {
    /// Worth retrying by the caller (resource pressure, timeout, cache I/O)
    Transient,
    /// Do not retry (bad request, contract violation)
    Permanent,
    /// Alert ops (OOM, retry ceiling exhausted)
    Infrastructure,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Transient => "transient",
            ErrorCategory::Permanent => "permanent",
            ErrorCategory::Infrastructure => "infrastructure",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
