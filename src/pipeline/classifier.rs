//! Model-loading boundary: an already-trained classifier exposed as
//! `predict(tensor) -> probability vector`.
//!
//! The pipeline never sees a model file format. Production models are ONNX
//! exports loaded once at startup (behind the `onnx` feature); tests inject
//! `FixedOutputModel` doubles through the same trait.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[cfg(feature = "onnx")]
use super::types::PreprocessSpec;
use super::types::Tensor;
use super::{InferenceError, PipelineError};
use crate::config::Config;

/// An opaque, read-only classifier.
///
/// Implementations must be safe to call from several requests at once; a runtime
/// that cannot run concurrent forward passes serializes them internally.
pub trait ClassifierModel: Send + Sync {
    /// Short identifier used in logs and errors.
    fn name(&self) -> &str;

    /// Input shape the model was exported with, if it declares one.
    fn input_shape(&self) -> Option<[usize; 4]> {
        None
    }

    /// Single forward pass. Returns the flattened output of the first output tensor.
    fn predict(&self, input: &Tensor) -> Result<Vec<f32>, InferenceError>;
}

/// Reject a tensor whose shape differs from the model's declared input contract.
pub fn check_input_shape(model: &dyn ClassifierModel, input: &Tensor) -> Result<(), InferenceError> {
    match model.input_shape() {
        Some(expected) if expected != input.shape() => Err(InferenceError::ShapeMismatch {
            model: model.name().to_string(),
            expected,
            actual: input.shape(),
        }),
        _ => Ok(()),
    }
}

/// The two process-wide models, loaded once and shared read-only.
#[derive(Clone)]
pub struct LoadedModels {
    pub gate: Arc<dyn ClassifierModel>,
    pub diagnosis: Arc<dyn ClassifierModel>,
}

// ═══════════════════════════════════════════════════════════
// ONNX classifier (behind `onnx` feature)
// ═══════════════════════════════════════════════════════════

#[cfg(feature = "onnx")]
mod onnx {
    use super::{ClassifierModel, InferenceError, PipelineError, Tensor};
    use ort::session::Session;
    use std::path::Path;
    use std::sync::Mutex;

    /// Classifier backed by ONNX Runtime.
    ///
    /// Uses interior mutability (Mutex) because ort::Session::run requires `&mut self`
    /// but `ClassifierModel` exposes `&self` for shared usage across requests.
    pub struct OnnxClassifier {
        name: String,
        input_shape: Option<[usize; 4]>,
        session: Mutex<Session>,
    }

    impl OnnxClassifier {
        /// Load an ONNX model file. `input_shape` is the tensor shape the model was
        /// exported for; mismatching inputs are rejected before reaching the runtime.
        pub fn load(
            name: &str,
            model_path: &Path,
            input_shape: Option<[usize; 4]>,
        ) -> Result<Self, PipelineError> {
            if !model_path.exists() {
                return Err(PipelineError::ModelNotFound(model_path.to_path_buf()));
            }

            let session = Session::builder()
                .map_err(|e: ort::Error| PipelineError::ModelInit(e.to_string()))?
                .with_intra_threads(2)
                .map_err(|e: ort::Error| PipelineError::ModelInit(e.to_string()))?
                .commit_from_file(model_path)
                .map_err(|e: ort::Error| {
                    PipelineError::ModelInit(format!("ONNX load failed for {name}: {e}"))
                })?;

            tracing::info!(model = name, path = %model_path.display(), "ONNX classifier loaded");

            Ok(Self {
                name: name.to_string(),
                input_shape,
                session: Mutex::new(session),
            })
        }

        fn runtime_error(&self, message: String) -> InferenceError {
            InferenceError::Runtime {
                model: self.name.clone(),
                message,
            }
        }
    }

    impl ClassifierModel for OnnxClassifier {
        fn name(&self) -> &str {
            &self.name
        }

        fn input_shape(&self) -> Option<[usize; 4]> {
            self.input_shape
        }

        fn predict(&self, input: &Tensor) -> Result<Vec<f32>, InferenceError> {
            use ort::value::TensorRef;

            let input_tensor = TensorRef::from_array_view(input.as_array())
                .map_err(|e| self.runtime_error(e.to_string()))?;

            let mut session = self
                .session
                .lock()
                .map_err(|_| InferenceError::LockPoisoned(self.name.clone()))?;

            let outputs = session
                .run(ort::inputs![input_tensor])
                .map_err(|e| self.runtime_error(format!("ONNX inference failed: {e}")))?;

            // Output shape: [1, n_classes] (or [1, 1] for the sigmoid gate)
            let (_shape, data) = outputs[0]
                .try_extract_tensor::<f32>()
                .map_err(|e| self.runtime_error(format!("Output extraction: {e}")))?;

            Ok(data.to_vec())
        }
    }
}

#[cfg(feature = "onnx")]
pub use onnx::OnnxClassifier;

/// Load both models named by `config`. Called once at startup.
#[cfg(feature = "onnx")]
pub fn load_models(config: &Config) -> Result<LoadedModels, PipelineError> {
    let gate = OnnxClassifier::load(
        "mri_gate",
        &config.gate_model_path,
        Some(PreprocessSpec::gate().tensor_shape()),
    )?;
    let diagnosis = OnnxClassifier::load(
        "severity_stage",
        &config.diagnosis_model_path,
        Some(PreprocessSpec::diagnosis().tensor_shape()),
    )?;
    Ok(LoadedModels {
        gate: Arc::new(gate),
        diagnosis: Arc::new(diagnosis),
    })
}

/// Without an inference backend there is nothing to load.
#[cfg(not(feature = "onnx"))]
pub fn load_models(config: &Config) -> Result<LoadedModels, PipelineError> {
    for path in [&config.gate_model_path, &config.diagnosis_model_path] {
        if !path.exists() {
            return Err(PipelineError::ModelNotFound(path.clone()));
        }
    }
    Err(PipelineError::BackendUnavailable)
}

// ═══════════════════════════════════════════════════════════
// FixedOutputModel: deterministic double
// ═══════════════════════════════════════════════════════════

/// Classifier that returns a fixed output vector and counts its invocations.
///
/// Stands in for a trained model in tests; the call counter makes
/// "this model was never invoked" directly observable.
pub struct FixedOutputModel {
    name: String,
    output: Vec<f32>,
    input_shape: Option<[usize; 4]>,
    calls: AtomicUsize,
}

impl FixedOutputModel {
    pub fn new(name: &str, output: Vec<f32>) -> Self {
        Self {
            name: name.to_string(),
            output,
            input_shape: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Declare an input contract so shape mismatches surface as errors.
    pub fn with_input_shape(mut self, shape: [usize; 4]) -> Self {
        self.input_shape = Some(shape);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ClassifierModel for FixedOutputModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn input_shape(&self) -> Option<[usize; 4]> {
        self.input_shape
    }

    fn predict(&self, _input: &Tensor) -> Result<Vec<f32>, InferenceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.output.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::types::PreprocessSpec;

    #[test]
    fn fixed_model_returns_output_and_counts_calls() {
        let model = FixedOutputModel::new("stub", vec![0.1, 0.9]);
        let input = Tensor::filled([1, 2, 2, 1], 0.0);
        assert_eq!(model.call_count(), 0);
        assert_eq!(model.predict(&input).unwrap(), vec![0.1, 0.9]);
        assert_eq!(model.predict(&input).unwrap(), vec![0.1, 0.9]);
        assert_eq!(model.call_count(), 2);
    }

    #[test]
    fn shape_check_passes_without_declared_contract() {
        let model = FixedOutputModel::new("stub", vec![0.5]);
        let input = Tensor::filled([1, 3, 3, 3], 0.0);
        assert!(check_input_shape(&model, &input).is_ok());
    }

    #[test]
    fn shape_check_rejects_mismatch() {
        let model = FixedOutputModel::new("stub", vec![0.5]).with_input_shape([1, 150, 150, 3]);
        let input = Tensor::filled([1, 176, 176, 1], 0.0);
        let err = check_input_shape(&model, &input).unwrap_err();
        match err {
            InferenceError::ShapeMismatch {
                model,
                expected,
                actual,
            } => {
                assert_eq!(model, "stub");
                assert_eq!(expected, [1, 150, 150, 3]);
                assert_eq!(actual, [1, 176, 176, 1]);
            }
            other => panic!("expected ShapeMismatch, got {other:?}"),
        }
    }

    #[test]
    fn shape_check_accepts_matching_tensor() {
        let model = FixedOutputModel::new("stub", vec![0.5])
            .with_input_shape(PreprocessSpec::diagnosis().tensor_shape());
        let input = Tensor::filled([1, 176, 176, 1], 0.0);
        assert!(check_input_shape(&model, &input).is_ok());
    }

    #[test]
    fn missing_model_file_reported_with_path() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::with_models_dir(dir.path());
        match load_models(&config) {
            Err(PipelineError::ModelNotFound(path)) => {
                assert_eq!(path, config.gate_model_path);
            }
            Err(other) => panic!("expected ModelNotFound, got {other}"),
            Ok(_) => panic!("expected ModelNotFound, got loaded models"),
        }
    }
}
