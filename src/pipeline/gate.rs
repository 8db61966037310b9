//! MRI / non-MRI gate.
//!
//! The gate model emits one sigmoid score: the probability that the image is
//! *not* a brain MRI. Scores at or below the threshold are MRIs, so an exact
//! 0.5 passes the gate.

use std::sync::Arc;

use tracing::{debug, warn};

use super::classifier::{check_input_shape, ClassifierModel};
use super::types::Tensor;
use super::InferenceError;
use crate::models::{GateDecision, GateLabel};

/// Decision threshold on the non-MRI score. Inclusive on the MRI side.
pub const GATE_THRESHOLD: f32 = 0.5;

/// Map a non-MRI score to a gate label.
pub fn decide(probability: f32) -> GateLabel {
    if probability <= GATE_THRESHOLD {
        GateLabel::Mri
    } else {
        GateLabel::NonMri
    }
}

/// Wraps the binary gate model. Single forward pass, no retries.
#[derive(Clone)]
pub struct GateClassifier {
    model: Arc<dyn ClassifierModel>,
    strict_contract: bool,
}

impl GateClassifier {
    pub fn new(model: Arc<dyn ClassifierModel>) -> Self {
        Self {
            model,
            strict_contract: false,
        }
    }

    /// Turn a score outside `[0, 1]` into an error instead of a warning.
    pub fn with_strict_contract(mut self, strict: bool) -> Self {
        self.strict_contract = strict;
        self
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    /// Run the gate model and keep its raw score alongside the verdict.
    pub fn assess(&self, tensor: &Tensor) -> Result<GateDecision, InferenceError> {
        check_input_shape(self.model.as_ref(), tensor)?;

        let output = self.model.predict(tensor)?;
        let probability = *output.first().ok_or_else(|| InferenceError::OutputLength {
            model: self.model.name().to_string(),
            expected: 1,
            actual: 0,
        })?;

        if !probability.is_finite() {
            return Err(InferenceError::NonFinite {
                model: self.model.name().to_string(),
                index: 0,
            });
        }

        // A raw logit here means the model was exported without its sigmoid
        if !(0.0..=1.0).contains(&probability) {
            if self.strict_contract {
                return Err(InferenceError::ScoreOutOfRange {
                    model: self.model.name().to_string(),
                    score: probability,
                });
            }
            warn!(model = self.model.name(), score = probability, "Gate score outside [0, 1] (model contract)");
        }

        let label = decide(probability);
        debug!(model = self.model.name(), probability, label = %label, "Gate scored image");

        Ok(GateDecision { label, probability })
    }

    pub fn is_mri(&self, tensor: &Tensor) -> Result<bool, InferenceError> {
        Ok(self.assess(tensor)?.is_mri())
    }
}
