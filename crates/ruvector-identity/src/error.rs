//! Error types for the identity encoder

use thiserror::Error;

/// Result type alias for identity encoder operations
pub type Result<T> = std::result::Result<T, IdentityError>;

/// Main error type for the identity encoder
#[derive(Error, Debug)]
pub enum IdentityError {
    /// Encoder configuration rejected at construction
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Feature vector length does not match `input_dim`
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected dimension
        expected: usize,
        /// Actual dimension
        actual: usize,
    },

    /// Classification attempted before any prototype exists
    #[error("Encoder has no class prototypes; train or enroll first")]
    NotTrained,

    /// Non-finite value in a feature vector
    #[error("Invalid feature value {value} at index {index}")]
    InvalidValue {
        /// Position of the offending feature
        index: usize,
        /// The rejected value
        value: f32,
    },

    /// Out-of-range operation parameter (alpha, threshold, k)
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// `train` called without samples
    #[error("Training set is empty")]
    EmptyTrainingSet,

    /// Bundling requested over zero vectors
    #[error("Empty vector set provided")]
    EmptyVectorSet,

    /// Operation refers to a class that has no prototype
    #[error("Unknown class: {0}")]
    UnknownClass(String),

    /// Model bytes are not a valid `HDC1` model
    #[error("Corrupt model: {0}")]
    CorruptModel(String),

    /// Model dimensions disagree with the live encoder
    #[error("Model mismatch on {field}: encoder has {expected}, model has {actual}")]
    ModelMismatch {
        /// Name of the disagreeing dimension
        field: &'static str,
        /// Value held by the live encoder
        expected: usize,
        /// Value found in the model
        actual: usize,
    },

    /// Encoder state cannot be expressed in an export format
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for IdentityError {
    fn from(err: serde_json::Error) -> Self {
        IdentityError::InvalidConfig(err.to_string())
    }
}
