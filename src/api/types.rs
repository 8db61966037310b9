//! Shared types for the API layer.

use std::sync::Arc;

use crate::pipeline::InferencePipeline;

/// Maximum request body: a 50 MiB image plus multipart overhead.
pub const MAX_BODY_BYTES: usize = 55 * 1024 * 1024;

/// Multipart field carrying the uploaded image.
pub const IMAGE_FIELD: &str = "image";

/// Shared context for all API routes.
///
/// The pipeline is read-only after startup, so one `Arc` is shared by every request.
#[derive(Clone)]
pub struct ApiContext {
    pub pipeline: Arc<InferencePipeline>,
}

impl ApiContext {
    pub fn new(pipeline: Arc<InferencePipeline>) -> Self {
        Self { pipeline }
    }
}
