//! API endpoint handlers and the upload/inference helpers they share.

pub mod diagnose;
pub mod health;
pub mod report;

use axum::extract::Multipart;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, IMAGE_FIELD};
use crate::models::PipelineOutcome;
use crate::pipeline::RawImage;

/// Pull the `image` field out of a multipart upload. Other fields are ignored.
pub(crate) async fn read_image_field(mut multipart: Multipart) -> Result<RawImage, ApiError> {
    loop {
        let field = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Malformed multipart body: {e}")))?;

        let Some(field) = field else {
            return Err(ApiError::BadRequest(format!(
                "Missing '{IMAGE_FIELD}' field"
            )));
        };

        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }

        let filename = field.file_name().map(str::to_string);
        let bytes = field.bytes().await.map_err(|e| {
            tracing::warn!("Failed to read upload bytes: {e}");
            ApiError::BadRequest("Failed to read image data".into())
        })?;

        let image = RawImage::from_bytes(bytes.to_vec())?;
        return Ok(match filename {
            Some(name) => image.with_name(name),
            None => image,
        });
    }
}

/// Run the pipeline on a blocking thread; forward passes are CPU-bound.
pub(crate) async fn run_pipeline(
    ctx: &ApiContext,
    image: RawImage,
) -> Result<(PipelineOutcome, RawImage), ApiError> {
    let pipeline = ctx.pipeline.clone();
    let (outcome, image) = tokio::task::spawn_blocking(move || {
        let outcome = pipeline.run(&image);
        (outcome, image)
    })
    .await?;
    Ok((outcome?, image))
}
