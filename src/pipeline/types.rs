use image::ImageFormat;
use ndarray::Array4;
use serde::Serialize;

use super::PipelineError;
use crate::models::ColorMode;

/// Maximum input image size (in bytes) before rejecting.
/// Prevents OOM on corrupt/adversarial uploads.
pub const MAX_IMAGE_BYTES: usize = 50 * 1024 * 1024; // 50 MB

/// Minimum valid image size in bytes (smallest valid PNG is ~67 bytes).
pub const MIN_IMAGE_BYTES: usize = 67;

/// Pixel scale mapping 8-bit intensities into `[0, 1]`.
pub const PIXEL_SCALE: f32 = 1.0 / 255.0;

// ═══════════════════════════════════════════════════════════
// RawImage
// ═══════════════════════════════════════════════════════════

/// Encoded image bytes as handed over by the upload boundary.
///
/// Owned by the caller for the duration of one request. Construction checks the
/// size window and sniffs the container format; decoding happens in `preprocess`.
#[derive(Debug, Clone)]
pub struct RawImage {
    bytes: Vec<u8>,
    format: ImageFormat,
    name: Option<String>,
}

impl RawImage {
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, PipelineError> {
        validate_image_bytes(&bytes)?;
        let format = detect_format(&bytes)?;
        Ok(Self {
            bytes,
            format,
            name: None,
        })
    }

    /// Attach the uploaded file name (used only for reporting).
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

/// Validate image byte size (prevents OOM on corrupt/adversarial files).
pub fn validate_image_bytes(bytes: &[u8]) -> Result<(), PipelineError> {
    if bytes.len() < MIN_IMAGE_BYTES {
        return Err(PipelineError::InvalidImage(format!(
            "Image too small ({} bytes, minimum {MIN_IMAGE_BYTES})",
            bytes.len()
        )));
    }
    if bytes.len() > MAX_IMAGE_BYTES {
        return Err(PipelineError::InvalidImage(format!(
            "Image too large ({} bytes, maximum {MAX_IMAGE_BYTES})",
            bytes.len()
        )));
    }
    Ok(())
}

/// Detect the container format from magic bytes. Only PNG, JPEG and TIFF are accepted.
fn detect_format(bytes: &[u8]) -> Result<ImageFormat, PipelineError> {
    match image::guess_format(bytes) {
        Ok(format @ (ImageFormat::Png | ImageFormat::Jpeg | ImageFormat::Tiff)) => Ok(format),
        Ok(other) => Err(PipelineError::InvalidImage(format!(
            "Unsupported image format: {other:?}"
        ))),
        Err(e) => Err(PipelineError::InvalidImage(format!(
            "Unrecognized image data: {e}"
        ))),
    }
}

// ═══════════════════════════════════════════════════════════
// PreprocessSpec
// ═══════════════════════════════════════════════════════════

/// What a model's input contract needs. Changes per model, never per request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PreprocessSpec {
    /// (width, height) in pixels.
    pub target_size: (u32, u32),
    pub color_mode: ColorMode,
    pub scale: f32,
}

impl PreprocessSpec {
    /// MRI/non-MRI gate model: 150x150 RGB.
    pub fn gate() -> Self {
        Self {
            target_size: (150, 150),
            color_mode: ColorMode::Rgb,
            scale: PIXEL_SCALE,
        }
    }

    /// Severity staging model: 176x176 single-channel.
    pub fn diagnosis() -> Self {
        Self {
            target_size: (176, 176),
            color_mode: ColorMode::Grayscale,
            scale: PIXEL_SCALE,
        }
    }

    /// Shape of the tensor this spec produces: (batch, height, width, channels).
    pub fn tensor_shape(&self) -> [usize; 4] {
        let (width, height) = self.target_size;
        [1, height as usize, width as usize, self.color_mode.channels()]
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        let (width, height) = self.target_size;
        if width == 0 || height == 0 {
            return Err(PipelineError::InvalidSpec(format!(
                "target size must be non-zero, got {width}x{height}"
            )));
        }
        // Anything above 1/255 would push 8-bit intensities past 1.0
        if !self.scale.is_finite() || self.scale <= 0.0 || self.scale > PIXEL_SCALE {
            return Err(PipelineError::InvalidSpec(format!(
                "scale must be in (0, 1/255], got {}",
                self.scale
            )));
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════
// Tensor
// ═══════════════════════════════════════════════════════════

/// Rank-4 model input, laid out (batch=1, height, width, channels), values in `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor(Array4<f32>);

impl Tensor {
    pub fn from_array(array: Array4<f32>) -> Self {
        Self(array)
    }

    /// Tensor of the given shape filled with `value`. Mostly useful for tests and warm-up.
    pub fn filled(shape: [usize; 4], value: f32) -> Self {
        Self(Array4::from_elem(shape, value))
    }

    pub fn shape(&self) -> [usize; 4] {
        let dim = self.0.dim();
        [dim.0, dim.1, dim.2, dim.3]
    }

    pub fn height(&self) -> usize {
        self.0.dim().1
    }

    pub fn width(&self) -> usize {
        self.0.dim().2
    }

    pub fn channels(&self) -> usize {
        self.0.dim().3
    }

    pub fn as_array(&self) -> &Array4<f32> {
        &self.0
    }

    pub fn into_array(self) -> Array4<f32> {
        self.0
    }

    /// Mean of all values (0.0 for an empty tensor).
    pub fn mean(&self) -> f32 {
        self.0.mean().unwrap_or(0.0)
    }
}
