//! Two-stage inference: gate, then (only for MRIs) severity staging.
//!
//! Linear state machine, no loops, no retries:
//! 1. preprocess(gate spec) → gate model
//! 2. not an MRI → `Rejected` (diagnosis model is never invoked)
//! 3. MRI → preprocess(diagnosis spec) from the original image → diagnosis model
//!
//! The pipeline holds only the injected read-only models and two specs, so one
//! instance can serve concurrent requests without any locking of its own.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, info_span};
use uuid::Uuid;

use super::classifier::{ClassifierModel, LoadedModels};
use super::diagnosis::DiagnosisClassifier;
use super::gate::GateClassifier;
use super::preprocess::preprocess;
use super::types::{PreprocessSpec, RawImage};
use super::PipelineError;
use crate::config::Config;
use crate::models::PipelineOutcome;

pub struct InferencePipeline {
    gate: GateClassifier,
    diagnosis: DiagnosisClassifier,
    gate_spec: PreprocessSpec,
    diagnosis_spec: PreprocessSpec,
}

impl InferencePipeline {
    /// Build a pipeline around two already-loaded models, with the standard specs.
    pub fn new(
        gate_model: Arc<dyn ClassifierModel>,
        diagnosis_model: Arc<dyn ClassifierModel>,
    ) -> Self {
        Self {
            gate: GateClassifier::new(gate_model),
            diagnosis: DiagnosisClassifier::new(diagnosis_model),
            gate_spec: PreprocessSpec::gate(),
            diagnosis_spec: PreprocessSpec::diagnosis(),
        }
    }

    /// Production pipeline from the startup-loaded models and runtime config.
    pub fn from_models(models: LoadedModels, config: &Config) -> Self {
        Self::new(models.gate, models.diagnosis).with_strict_contract(config.strict_contract)
    }

    pub fn with_gate_spec(mut self, spec: PreprocessSpec) -> Self {
        self.gate_spec = spec;
        self
    }

    pub fn with_diagnosis_spec(mut self, spec: PreprocessSpec) -> Self {
        self.diagnosis_spec = spec;
        self
    }

    /// Model contract violations (gate score outside `[0, 1]`, unnormalized
    /// distribution) become errors instead of warnings.
    pub fn with_strict_contract(mut self, strict: bool) -> Self {
        self.gate = self.gate.with_strict_contract(strict);
        self.diagnosis = self.diagnosis.with_strict_contract(strict);
        self
    }

    pub fn gate_spec(&self) -> &PreprocessSpec {
        &self.gate_spec
    }

    pub fn diagnosis_spec(&self) -> &PreprocessSpec {
        &self.diagnosis_spec
    }

    pub fn gate_model_name(&self) -> &str {
        self.gate.model_name()
    }

    pub fn diagnosis_model_name(&self) -> &str {
        self.diagnosis.model_name()
    }

    /// Run one image through the pipeline.
    ///
    /// Errors mean no decision could be reached; `Rejected` is a decision.
    pub fn run(&self, image: &RawImage) -> Result<PipelineOutcome, PipelineError> {
        let request_id = Uuid::new_v4();
        let span = info_span!("pipeline_run", %request_id, image = image.name().unwrap_or("-"));
        let _guard = span.enter();
        let started = Instant::now();

        // 1. Gate
        let gate_tensor = preprocess(image, &self.gate_spec)?;
        let decision = self.gate.assess(&gate_tensor)?;
        debug!(elapsed_ms = started.elapsed().as_millis() as u64, "Gate stage complete");

        // 2. Short-circuit
        if !decision.is_mri() {
            info!(
                gate_probability = decision.probability,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Image rejected: not a brain MRI"
            );
            return Ok(PipelineOutcome::Rejected {
                gate_probability: decision.probability,
            });
        }

        // 3. Diagnosis, re-derived from the original image
        let diagnosis_tensor = preprocess(image, &self.diagnosis_spec)?;
        let result = self.diagnosis.classify(&diagnosis_tensor)?;

        info!(
            label = %result.predicted_label,
            confidence = result.confidence,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Image diagnosed"
        );

        Ok(PipelineOutcome::Diagnosed(result))
    }
}
