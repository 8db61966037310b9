//! `POST /api/report`: upload one image, get a PDF report for it.

use axum::extract::{Multipart, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};

use super::{read_image_field, run_pipeline};
use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::models::PipelineOutcome;
use crate::report::render_pdf;

pub async fn pdf(
    State(ctx): State<ApiContext>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let image = read_image_field(multipart).await?;
    let (outcome, image) = run_pipeline(&ctx, image).await?;

    let result = match outcome {
        PipelineOutcome::Diagnosed(result) => result,
        PipelineOutcome::Rejected { .. } => return Err(ApiError::NotAnMri),
    };

    let bytes = render_pdf(&result, image.name())?;
    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf"),
            (header::CONTENT_DISPOSITION, "attachment; filename=\"results.pdf\""),
        ],
        bytes,
    )
        .into_response())
}
