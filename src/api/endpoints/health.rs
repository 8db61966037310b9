//! Health check endpoint.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::api::types::ApiContext;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub gate_model: String,
    pub diagnosis_model: String,
}

/// `GET /api/health`: liveness plus the names of the loaded models.
pub async fn check(State(ctx): State<ApiContext>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: crate::config::APP_VERSION,
        gate_model: ctx.pipeline.gate_model_name().to_string(),
        diagnosis_model: ctx.pipeline.diagnosis_model_name().to_string(),
    })
}
