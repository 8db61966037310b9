pub mod types;
pub mod preprocess;
pub mod classifier;
pub mod gate;
pub mod diagnosis;
pub mod orchestrator;

pub use types::*;
pub use preprocess::*;
pub use classifier::*;
pub use gate::*;
pub use diagnosis::*;
pub use orchestrator::*;

use std::path::PathBuf;

use thiserror::Error;

/// Failure of a single model invocation. Fatal to the current request, never retried.
#[derive(Error, Debug)]
pub enum InferenceError {
    #[error("Model '{model}' expects input shape {expected:?}, got {actual:?}")]
    ShapeMismatch {
        model: String,
        expected: [usize; 4],
        actual: [usize; 4],
    },

    #[error("Model '{model}' returned {actual} outputs, expected {expected}")]
    OutputLength {
        model: String,
        expected: usize,
        actual: usize,
    },

    #[error("Model '{model}' returned a non-finite value at index {index}")]
    NonFinite { model: String, index: usize },

    #[error("Model '{model}' distribution sums to {sum}, outside tolerance of 1.0")]
    ContractViolation { model: String, sum: f32 },

    #[error("Model '{model}' score {score} is outside [0, 1]")]
    ScoreOutOfRange { model: String, score: f32 },

    #[error("Model '{model}' runtime error: {message}")]
    Runtime { model: String, message: String },

    #[error("Model '{0}' session lock poisoned")]
    LockPoisoned(String),
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Invalid image: {0}")]
    InvalidImage(String),

    #[error("Invalid preprocessing spec: {0}")]
    InvalidSpec(String),

    #[error("Inference failed: {0}")]
    Inference(#[from] InferenceError),

    #[error("Model file not found at: {0}")]
    ModelNotFound(PathBuf),

    #[error("Model initialization failed: {0}")]
    ModelInit(String),

    #[error("No inference backend compiled in (enable the `onnx` feature)")]
    BackendUnavailable,
}
