//! Image preprocessing: encoded upload bytes → model input tensor.
//!
//! Pure image-to-tensor transform with no I/O and no model calls.
//! Each call re-derives its tensor from the original `RawImage`, so the gate and
//! diagnosis models never share an intermediate.
//!
//! Steps, in order:
//! 1. Validate spec
//! 2. Decode image (container format sniffed at `RawImage` construction)
//! 3. Color conversion (RGB, or ITU-R 601-2 luma for grayscale)
//! 4. Resize to `target_size` with nearest-neighbour (stretch, no crop, no padding)
//! 5. Scale intensities by `spec.scale`
//! 6. Add the batch dimension

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, GrayImage, Luma, RgbImage};
use ndarray::Array4;
use tracing::debug;

use super::types::{PreprocessSpec, RawImage, Tensor};
use super::PipelineError;
use crate::models::ColorMode;

/// Interpolation used for every resize. Both models were trained on
/// nearest-neighbour resized inputs.
pub const RESIZE_FILTER: FilterType = FilterType::Nearest;

/// Convert an uploaded image into a `(1, height, width, channels)` tensor for `spec`.
///
/// Deterministic: identical bytes and spec always give bit-identical tensors.
pub fn preprocess(image: &RawImage, spec: &PreprocessSpec) -> Result<Tensor, PipelineError> {
    // 1. Validate spec
    spec.validate()?;

    // 2. Decode image
    let decoded = decode(image)?;
    let (orig_w, orig_h) = decoded.dimensions();

    // 3 + 4. Convert color mode, then resize
    let (width, height) = spec.target_size;
    let raw = match spec.color_mode {
        ColorMode::Rgb => {
            let rgb = decoded.to_rgb8();
            image::imageops::resize(&rgb, width, height, RESIZE_FILTER).into_raw()
        }
        ColorMode::Grayscale => {
            let gray = to_luma_rec601(&decoded.to_rgb8());
            image::imageops::resize(&gray, width, height, RESIZE_FILTER).into_raw()
        }
    };

    // 5 + 6. Scale and add batch dimension
    let tensor = to_tensor(raw, spec)?;

    debug!(
        original = %format!("{orig_w}x{orig_h}"),
        output = ?tensor.shape(),
        color_mode = spec.color_mode.as_str(),
        "Image preprocessed for model input"
    );

    Ok(tensor)
}

/// Decode the raw bytes, rejecting images with a zero-sized dimension.
fn decode(image: &RawImage) -> Result<DynamicImage, PipelineError> {
    let decoded = image::load_from_memory_with_format(image.bytes(), image.format())
        .map_err(|e| PipelineError::InvalidImage(format!("Failed to decode image: {e}")))?;

    let (w, h) = decoded.dimensions();
    if w == 0 || h == 0 {
        return Err(PipelineError::InvalidImage(format!(
            "Image has zero-sized dimensions ({w}x{h})"
        )));
    }
    Ok(decoded)
}

/// ITU-R 601-2 luma transform, `L = R*299/1000 + G*587/1000 + B*114/1000`.
///
/// Fixed-point with round-half-up, so a pixel with R == G == B keeps its value.
pub fn to_luma_rec601(rgb: &RgbImage) -> GrayImage {
    let mut gray = GrayImage::new(rgb.width(), rgb.height());
    for (x, y, pixel) in rgb.enumerate_pixels() {
        let [r, g, b] = pixel.0;
        let luma = (r as u32 * 19_595 + g as u32 * 38_470 + b as u32 * 7_471 + 0x8000) >> 16;
        gray.put_pixel(x, y, Luma([luma as u8]));
    }
    gray
}

/// Row-major HWC bytes → scaled `(1, h, w, c)` tensor.
fn to_tensor(raw: Vec<u8>, spec: &PreprocessSpec) -> Result<Tensor, PipelineError> {
    let shape = spec.tensor_shape();
    let values: Vec<f32> = raw.into_iter().map(|v| v as f32 * spec.scale).collect();
    let array = Array4::from_shape_vec(shape, values).map_err(|e| {
        PipelineError::InvalidImage(format!("Resized image does not fit {shape:?}: {e}"))
    })?;
    Ok(Tensor::from_array(array))
}
