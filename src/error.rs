//! Error types for the boostflow workflow

use thiserror::Error;

/// Result type alias for boostflow operations
pub type Result<T> = std::result::Result<T, FlowError>;

/// Main error type for the workflow and its stages
#[derive(Error, Debug)]
pub enum FlowError {
    /// Dataset or artifact could not be fetched (network or path failure)
    #[error("Data fetch error: {0}")]
    DataFetch(String),

    /// Wrong column count, name or type, or an unparseable row
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    /// Two row-aligned tables disagree on length
    #[error("Size mismatch in {context}: expected {expected} rows, got {actual}")]
    SizeMismatch {
        context: String,
        expected: usize,
        actual: usize,
    },

    /// A serialized model artifact could not be decoded
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Training error: {0}")]
    TrainingError(String),

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Workflow graph construction or validation failed
    #[error("Graph error: {0}")]
    GraphError(String),

    /// A stage failed while the executor was running it
    #[error("Stage `{node}` failed: {source}")]
    StageFailed {
        node: String,
        #[source]
        source: Box<FlowError>,
    },

    #[error("Execution error: {0}")]
    ExecutionError(String),

    #[error("Data error: {0}")]
    DataError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },
}

impl FlowError {
    /// Wrap an error with the id of the node that produced it
    pub fn in_stage(self, node: impl Into<String>) -> Self {
        FlowError::StageFailed {
            node: node.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, looking through `StageFailed` wrappers
    pub fn root(&self) -> &FlowError {
        match self {
            FlowError::StageFailed { source, .. } => source.root(),
            other => other,
        }
    }

    pub fn invalid_parameter(
        name: impl Into<String>,
        value: impl ToString,
        reason: impl Into<String>,
    ) -> Self {
        FlowError::InvalidParameter {
            name: name.into(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<polars::error::PolarsError> for FlowError {
    fn from(err: polars::error::PolarsError) -> Self {
        FlowError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for FlowError {
    fn from(err: serde_json::Error) -> Self {
        FlowError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for FlowError {
    fn from(err: ndarray::ShapeError) -> Self {
        FlowError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}

impl From<reqwest::Error> for FlowError {
    fn from(err: reqwest::Error) -> Self {
        FlowError::DataFetch(err.to_string())
    }
}
