//! `POST /api/diagnose`: upload one image, get the pipeline outcome back.
//!
//! JSON by default; `?format=text` returns the plain-text summary instead.

use axum::extract::{Multipart, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;

use super::{read_image_field, run_pipeline};
use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::report::render_text;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseFormat {
    #[default]
    Json,
    Text,
}

#[derive(Debug, Default, Deserialize)]
pub struct DiagnoseParams {
    #[serde(default)]
    pub format: ResponseFormat,
}

/// Both `rejected` and `diagnosed` are successful responses; only bad
/// uploads and inference failures are errors.
pub async fn diagnose(
    State(ctx): State<ApiContext>,
    Query(params): Query<DiagnoseParams>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let image = read_image_field(multipart).await?;
    let (outcome, _) = run_pipeline(&ctx, image).await?;

    Ok(match params.format {
        ResponseFormat::Json => Json(outcome).into_response(),
        ResponseFormat::Text => (
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            render_text(&outcome),
        )
            .into_response(),
    })
}
