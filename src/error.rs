use std::fmt;

/// Result type for a3c_nav operations
pub type Result<T> = std::result::Result<T, A3cError>;

/// Main error type for the crate
#[derive(Debug, Clone)]
pub enum A3cError {
    /// Observation or parameter shapes disagree with the declared layout
    DimensionMismatch {
        expected: String,
        actual: String,
    },

    /// Invalid configuration or constructor argument
    InvalidParameter {
        name: String,
        reason: String,
    },

    /// The environment collaborator failed to reset or step
    Environment(String),

    /// IO errors (checkpoints, config files, telemetry)
    IoError(String),

    /// Serialization/deserialization errors
    SerializationError(String),

    /// Worker or evaluator failure
    TrainingError(String),
}

impl fmt::Display for A3cError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            A3cError::DimensionMismatch { expected, actual } => {
                write!(f, "Dimension mismatch: expected {}, got {}", expected, actual)
            }
            A3cError::InvalidParameter { name, reason } => {
                write!(f, "Invalid parameter '{}': {}", name, reason)
            }
            A3cError::Environment(msg) => write!(f, "Environment error: {}", msg),
            A3cError::IoError(msg) => write!(f, "IO error: {}", msg),
            A3cError::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
            A3cError::TrainingError(msg) => write!(f, "Training error: {}", msg),
        }
    }
}

impl std::error::Error for A3cError {}

impl From<std::io::Error> for A3cError {
    fn from(err: std::io::Error) -> Self {
        A3cError::IoError(err.to_string())
    }
}

impl From<bincode::Error> for A3cError {
    fn from(err: bincode::Error) -> Self {
        A3cError::SerializationError(err.to_string())
    }
}

impl From<serde_json::Error> for A3cError {
    fn from(err: serde_json::Error) -> Self {
        A3cError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for A3cError {
    fn from(err: ndarray::ShapeError) -> Self {
        A3cError::DimensionMismatch {
            expected: "contiguous reshape".to_string(),
            actual: err.to_string(),
        }
    }
}

// Helper functions for common error patterns
impl A3cError {
    pub fn dimension_mismatch<E: Into<String>, A: Into<String>>(expected: E, actual: A) -> Self {
        A3cError::DimensionMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    pub fn invalid_parameter<N: Into<String>, R: Into<String>>(name: N, reason: R) -> Self {
        A3cError::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn environment<S: Into<String>>(msg: S) -> Self {
        A3cError::Environment(msg.into())
    }
}
