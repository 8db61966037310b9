//! Severity staging over the four `SeverityStage` classes.
//!
//! The model output is trusted to be a softmax: it is never re-normalized.
//! Labels come from position in the output vector, so `SeverityStage` order
//! must match the model's output order exactly.

use std::sync::Arc;

use tracing::{debug, warn};

use super::classifier::{check_input_shape, ClassifierModel};
use super::types::Tensor;
use super::InferenceError;
use crate::models::{DiagnosisResult, SeverityStage};

/// Allowed deviation of the distribution sum from 1.0.
pub const DISTRIBUTION_TOLERANCE: f32 = 1e-3;

/// Index and value of the largest entry. Ties resolve to the lowest index.
pub fn argmax(values: &[f32]) -> Option<(usize, f32)> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &v) in values.iter().enumerate() {
        match best {
            Some((_, current)) if v <= current => {}
            _ => best = Some((i, v)),
        }
    }
    best
}

/// Whether `distribution` sums to 1.0 within `DISTRIBUTION_TOLERANCE`.
pub fn is_normalized(distribution: &[f32]) -> bool {
    let sum: f32 = distribution.iter().sum();
    (sum - 1.0).abs() <= DISTRIBUTION_TOLERANCE
}

/// Wraps the 4-class severity model.
#[derive(Clone)]
pub struct DiagnosisClassifier {
    model: Arc<dyn ClassifierModel>,
    strict_contract: bool,
}

impl DiagnosisClassifier {
    pub fn new(model: Arc<dyn ClassifierModel>) -> Self {
        Self {
            model,
            strict_contract: false,
        }
    }

    /// Turn a distribution that does not sum to 1.0 into an error instead of a warning.
    pub fn with_strict_contract(mut self, strict: bool) -> Self {
        self.strict_contract = strict;
        self
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    pub fn classify(&self, tensor: &Tensor) -> Result<DiagnosisResult, InferenceError> {
        check_input_shape(self.model.as_ref(), tensor)?;
        let distribution = self.model.predict(tensor)?;
        self.interpret(distribution)
    }

    /// Validate a raw output vector and pick the predicted stage.
    fn interpret(&self, distribution: Vec<f32>) -> Result<DiagnosisResult, InferenceError> {
        let model = self.model.name();

        if distribution.len() != SeverityStage::COUNT {
            return Err(InferenceError::OutputLength {
                model: model.to_string(),
                expected: SeverityStage::COUNT,
                actual: distribution.len(),
            });
        }

        if let Some(index) = distribution.iter().position(|v| !v.is_finite()) {
            return Err(InferenceError::NonFinite {
                model: model.to_string(),
                index,
            });
        }

        if !is_normalized(&distribution) {
            let sum: f32 = distribution.iter().sum();
            if self.strict_contract {
                return Err(InferenceError::ContractViolation {
                    model: model.to_string(),
                    sum,
                });
            }
            warn!(model, sum, "Diagnosis distribution does not sum to 1.0 (model contract)");
        }

        let (index, confidence) = argmax(&distribution).ok_or_else(|| InferenceError::OutputLength {
            model: model.to_string(),
            expected: SeverityStage::COUNT,
            actual: 0,
        })?;
        let predicted_label =
            SeverityStage::from_index(index).ok_or_else(|| InferenceError::OutputLength {
                model: model.to_string(),
                expected: SeverityStage::COUNT,
                actual: distribution.len(),
            })?;

        debug!(model, label = %predicted_label, confidence, "Diagnosis classified");

        Ok(DiagnosisResult {
            predicted_label,
            confidence,
            distribution,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::FixedOutputModel;

    fn classifier_with(output: Vec<f32>) -> DiagnosisClassifier {
        DiagnosisClassifier::new(Arc::new(FixedOutputModel::new("diagnosis", output)))
    }

    fn input() -> Tensor {
        Tensor::filled([1, 176, 176, 1], 0.4)
    }

    // ── argmax ──

    #[test]
    fn argmax_picks_largest() {
        assert_eq!(argmax(&[0.1, 0.7, 0.2]), Some((1, 0.7)));
    }

    #[test]
    fn argmax_tie_resolves_to_lowest_index() {
        assert_eq!(argmax(&[0.25, 0.25, 0.25, 0.25]), Some((0, 0.25)));
        assert_eq!(argmax(&[0.1, 0.45, 0.45, 0.0]), Some((1, 0.45)));
    }

    #[test]
    fn argmax_empty_is_none() {
        assert_eq!(argmax(&[]), None);
    }

    // ── classify ──

    #[test]
    fn uniform_distribution_predicts_mild_demented() {
        let result = classifier_with(vec![0.25; 4]).classify(&input()).unwrap();
        assert_eq!(result.predicted_label, SeverityStage::MildDemented);
        assert_eq!(result.confidence, 0.25);
    }

    #[test]
    fn non_demented_fixture() {
        let result = classifier_with(vec![0.05, 0.05, 0.85, 0.05])
            .classify(&input())
            .unwrap();
        assert_eq!(result.predicted_label, SeverityStage::NonDemented);
        assert_eq!(result.confidence, 0.85);
        assert_eq!(result.distribution, vec![0.05, 0.05, 0.85, 0.05]);
    }

    #[test]
    fn each_index_maps_to_its_stage() {
        for stage in SeverityStage::ALL {
            let mut output = vec![0.1; 4];
            output[stage.index()] = 0.7;
            let result = classifier_with(output).classify(&input()).unwrap();
            assert_eq!(result.predicted_label, *stage);
        }
    }

    #[test]
    fn output_is_not_renormalized() {
        let result = classifier_with(vec![0.1, 0.1, 0.1, 0.7002])
            .classify(&input())
            .unwrap();
        assert_eq!(result.distribution[3], 0.7002);
        assert_eq!(result.confidence, 0.7002);
    }

    #[test]
    fn wrong_output_length_is_inference_error() {
        let err = classifier_with(vec![0.5, 0.5]).classify(&input()).unwrap_err();
        assert!(matches!(
            err,
            InferenceError::OutputLength {
                expected: 4,
                actual: 2,
                ..
            }
        ));
    }

    #[test]
    fn non_finite_entry_is_inference_error() {
        let err = classifier_with(vec![0.2, f32::NAN, 0.4, 0.4])
            .classify(&input())
            .unwrap_err();
        assert!(matches!(err, InferenceError::NonFinite { index: 1, .. }));
    }

    // ── distribution contract ──

    #[test]
    fn is_normalized_within_tolerance() {
        assert!(is_normalized(&[0.05, 0.05, 0.85, 0.05]));
        assert!(is_normalized(&[0.25, 0.25, 0.25, 0.2505]));
        assert!(!is_normalized(&[0.5, 0.5, 0.5, 0.5]));
        assert!(!is_normalized(&[0.25, 0.25, 0.25, 0.24]));
    }

    #[test]
    fn unnormalized_output_is_flagged_but_returned_by_default() {
        let result = classifier_with(vec![0.5, 0.5, 0.5, 0.5])
            .classify(&input())
            .unwrap();
        assert_eq!(result.predicted_label, SeverityStage::MildDemented);
        assert!(!is_normalized(&result.distribution));
    }

    #[test]
    fn strict_contract_rejects_unnormalized_output() {
        let err = classifier_with(vec![0.5, 0.5, 0.5, 0.5])
            .with_strict_contract(true)
            .classify(&input())
            .unwrap_err();
        match err {
            InferenceError::ContractViolation { sum, .. } => assert!((sum - 2.0).abs() < 1e-6),
            other => panic!("expected ContractViolation, got {other:?}"),
        }
    }

    #[test]
    fn strict_contract_accepts_softmax_output() {
        let result = classifier_with(vec![0.05, 0.05, 0.85, 0.05])
            .with_strict_contract(true)
            .classify(&input());
        assert!(result.is_ok());
    }

    #[test]
    fn shape_mismatch_is_inference_error() {
        let model = Arc::new(
            FixedOutputModel::new("diagnosis", vec![0.25; 4]).with_input_shape([1, 176, 176, 1]),
        );
        let classifier = DiagnosisClassifier::new(model.clone());
        let err = classifier
            .classify(&Tensor::filled([1, 150, 150, 3], 0.0))
            .unwrap_err();
        assert!(matches!(err, InferenceError::ShapeMismatch { .. }));
        assert_eq!(model.call_count(), 0);
    }
}
