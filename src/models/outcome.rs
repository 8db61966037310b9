use serde::{Deserialize, Serialize};

use super::enums::{GateLabel, SeverityStage};

/// Gate verdict for one image, with the raw non-MRI score it was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GateDecision {
    pub label: GateLabel,
    pub probability: f32,
}

impl GateDecision {
    pub fn is_mri(&self) -> bool {
        self.label == GateLabel::Mri
    }
}

/// Severity staging for an image the gate accepted.
///
/// `confidence` is the largest entry of `distribution`; `predicted_label` is its
/// position in `SeverityStage` order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosisResult {
    pub predicted_label: SeverityStage,
    pub confidence: f32,
    pub distribution: Vec<f32>,
}

impl DiagnosisResult {
    pub fn distribution_sum(&self) -> f32 {
        self.distribution.iter().sum()
    }

    /// Probability the model assigned to `stage`.
    pub fn probability_of(&self, stage: SeverityStage) -> Option<f32> {
        self.distribution.get(stage.index()).copied()
    }

    /// (stage, probability) pairs in label order.
    pub fn labelled(&self) -> impl Iterator<Item = (SeverityStage, f32)> + '_ {
        SeverityStage::ALL
            .iter()
            .copied()
            .zip(self.distribution.iter().copied())
    }
}

/// Terminal state of one pipeline run.
///
/// `Rejected` is a valid outcome, not a failure: the gate declined the image and
/// no clinical label exists for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PipelineOutcome {
    Rejected { gate_probability: f32 },
    Diagnosed(DiagnosisResult),
}

impl PipelineOutcome {
    pub fn is_rejected(&self) -> bool {
        matches!(self, PipelineOutcome::Rejected { .. })
    }

    pub fn diagnosis(&self) -> Option<&DiagnosisResult> {
        match self {
            PipelineOutcome::Diagnosed(result) => Some(result),
            PipelineOutcome::Rejected { .. } => None,
        }
    }
}
