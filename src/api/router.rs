//! API router.
//!
//! Returns a composable `Router` that can be mounted on any axum server.
//! Routes are nested under `/api/`.

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::api::endpoints;
use crate::api::types::{ApiContext, MAX_BODY_BYTES};
use crate::pipeline::InferencePipeline;

/// Build the API router around a shared pipeline.
pub fn api_router(pipeline: Arc<InferencePipeline>) -> Router {
    build_router(ApiContext::new(pipeline))
}

fn build_router(ctx: ApiContext) -> Router {
    let routes = Router::new()
        .route("/health", get(endpoints::health::check))
        .route("/diagnose", post(endpoints::diagnose::diagnose))
        .route("/report", post(endpoints::report::pdf))
        .with_state(ctx);

    Router::new()
        .nest("/api", routes)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use image::{DynamicImage, ImageOutputFormat, Rgb, RgbImage};
    use std::io::Cursor;
    use tower::ServiceExt;

    use crate::pipeline::{FixedOutputModel, PreprocessSpec};
    use crate::report::REJECTION_MESSAGE;

    const BOUNDARY: &str = "neurotriage-test-boundary";

    fn pipeline_with(gate: Vec<f32>, diagnosis: Vec<f32>) -> Arc<InferencePipeline> {
        let gate = Arc::new(
            FixedOutputModel::new("mri_gate", gate)
                .with_input_shape(PreprocessSpec::gate().tensor_shape()),
        );
        let diagnosis = Arc::new(
            FixedOutputModel::new("severity_stage", diagnosis)
                .with_input_shape(PreprocessSpec::diagnosis().tensor_shape()),
        );
        Arc::new(InferencePipeline::new(gate, diagnosis))
    }

    fn mri_router() -> Router {
        api_router(pipeline_with(vec![0.03], vec![0.05, 0.05, 0.85, 0.05]))
    }

    fn non_mri_router() -> Router {
        api_router(pipeline_with(vec![0.96], vec![0.05, 0.05, 0.85, 0.05]))
    }

    fn png_bytes() -> Vec<u8> {
        let img = RgbImage::from_fn(64, 64, |x, y| Rgb([(x * 4) as u8, (y * 4) as u8, 40]));
        let mut cursor = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut cursor, ImageOutputFormat::Png)
            .unwrap();
        cursor.into_inner()
    }

    fn multipart_body(field: &str, filename: &str, data: &[u8]) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn upload(uri: &str, body: Vec<u8>) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn json_of(response: axum::response::Response) -> serde_json::Value {
        let body = to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    // ── health ──

    #[tokio::test]
    async fn health_reports_models() {
        let response = mri_router()
            .oneshot(Request::get("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = json_of(response).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["version"], crate::config::APP_VERSION);
        assert_eq!(json["gate_model"], "mri_gate");
        assert_eq!(json["diagnosis_model"], "severity_stage");
    }

    #[tokio::test]
    async fn unknown_route_returns_404() {
        let response = mri_router()
            .oneshot(Request::get("/nonexistent").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn diagnose_requires_post() {
        let response = mri_router()
            .oneshot(Request::get("/api/diagnose").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    // ── diagnose ──

    #[tokio::test]
    async fn diagnose_returns_diagnosis_for_mri() {
        let body = multipart_body("image", "scan.png", &png_bytes());
        let response = mri_router()
            .oneshot(upload("/api/diagnose", body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = json_of(response).await;
        assert_eq!(json["outcome"], "diagnosed");
        assert_eq!(json["predicted_label"], "NonDemented");
        assert_eq!(json["distribution"].as_array().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn diagnose_rejection_is_success_without_label() {
        let body = multipart_body("image", "cat.png", &png_bytes());
        let response = non_mri_router()
            .oneshot(upload("/api/diagnose", body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = json_of(response).await;
        assert_eq!(json["outcome"], "rejected");
        assert!(json.get("predicted_label").is_none());
        assert!(json.get("distribution").is_none());
    }

    #[tokio::test]
    async fn diagnose_text_format_returns_summary() {
        let body = multipart_body("image", "scan.png", &png_bytes());
        let response = mri_router()
            .oneshot(upload("/api/diagnose?format=text", body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response
            .headers()
            .get(header::CONTENT_TYPE)
            .unwrap()
            .to_str()
            .unwrap()
            .starts_with("text/plain"));

        let bytes = to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.starts_with("Prediction: NonDemented\n"));
        assert!(text.contains("Confidence: 85.00%"));
        assert!(text.contains("MildDemented: 5.00%"));
    }

    #[tokio::test]
    async fn diagnose_text_format_for_rejection() {
        let body = multipart_body("image", "cat.png", &png_bytes());
        let response = non_mri_router()
            .oneshot(upload("/api/diagnose?format=text", body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
        assert_eq!(&bytes[..], REJECTION_MESSAGE.as_bytes());
    }

    #[tokio::test]
    async fn diagnose_explicit_json_format() {
        let body = multipart_body("image", "scan.png", &png_bytes());
        let response = mri_router()
            .oneshot(upload("/api/diagnose?format=json", body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = json_of(response).await;
        assert_eq!(json["outcome"], "diagnosed");
    }

    #[tokio::test]
    async fn diagnose_missing_image_field_is_bad_request() {
        let body = multipart_body("file", "scan.png", &png_bytes());
        let response = mri_router()
            .oneshot(upload("/api/diagnose", body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = json_of(response).await;
        assert_eq!(json["error"]["code"], "BAD_REQUEST");
    }

    #[tokio::test]
    async fn diagnose_undecodable_upload_is_invalid_image() {
        let garbage = b"this is plain text, not an image, padded out past the minimum size".repeat(2);
        let body = multipart_body("image", "notes.txt", &garbage);
        let response = mri_router()
            .oneshot(upload("/api/diagnose", body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = json_of(response).await;
        assert_eq!(json["error"]["code"], "INVALID_IMAGE");
    }

    #[tokio::test]
    async fn diagnose_inference_failure_is_500() {
        // Gate returns no score at all
        let router = api_router(pipeline_with(vec![], vec![0.25; 4]));
        let body = multipart_body("image", "scan.png", &png_bytes());
        let response = router.oneshot(upload("/api/diagnose", body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = json_of(response).await;
        assert_eq!(json["error"]["code"], "INTERNAL");
    }

    // ── report ──

    #[tokio::test]
    async fn report_returns_pdf_for_mri() {
        let body = multipart_body("image", "scan.png", &png_bytes());
        let response = mri_router()
            .oneshot(upload("/api/report", body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/pdf"
        );

        let bytes = to_bytes(response.into_body(), 10 * 1024 * 1024).await.unwrap();
        assert_eq!(&bytes[0..4], b"%PDF");
    }

    #[tokio::test]
    async fn report_refused_for_non_mri() {
        let body = multipart_body("image", "cat.png", &png_bytes());
        let response = non_mri_router()
            .oneshot(upload("/api/report", body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let json = json_of(response).await;
        assert_eq!(json["error"]["code"], "NOT_AN_MRI");
        assert_eq!(json["error"]["message"], REJECTION_MESSAGE);
    }
}
