//! Upload image normalization for OMR input
//!
//! Standardizes an uploaded image to a single-channel, contrast-stretched,
//! sharpened PNG at a bounded width. Staff lines and note heads survive
//! Lanczos3 resampling well, and the unsharp mask is tuned for line art
//! rather than photographs.
//!
//! Normalization never fails a file: when the bytes cannot be decoded or
//! processed (e.g. a PDF upload), the original bytes are written through
//! unmodified and the recognition engine gets them as-is.

use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, ImageFormat};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

/// Normalization settings
#[derive(Debug, Clone, Copy)]
pub struct NormalizeConfig {
    /// Width bounds of the output image
    pub min_width: u32,
    pub max_width: u32,
    /// Upscale factor applied before clamping
    pub scale: f32,
    /// Unsharp mask blur radius
    pub sharpen_sigma: f32,
    /// Unsharp mask threshold; low values amplify notation edges
    pub sharpen_threshold: i32,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            min_width: 1200,
            max_width: 2400,
            scale: 1.2,
            sharpen_sigma: 1.0,
            sharpen_threshold: 2,
        }
    }
}

/// Errors during image normalization (always recoverable via passthrough)
#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("image processing failed: {0}")]
    Image(#[from] image::ImageError),

    #[error("failed to write normalized image: {0}")]
    Io(#[from] std::io::Error),
}

/// Normalize `bytes` into a PNG at `output_path`
///
/// On any processing failure the original bytes are written through
/// unmodified; only a failure to write the output file at all is an error.
pub fn normalize_or_passthrough(
    bytes: &[u8],
    output_path: &Path,
    config: &NormalizeConfig,
) -> std::io::Result<()> {
    match normalize(bytes, output_path, config) {
        Ok(()) => Ok(()),
        Err(err) => {
            warn!(
                output = %output_path.display(),
                error = %err,
                "Image normalization failed, passing original through"
            );
            std::fs::write(output_path, bytes)
        }
    }
}

/// Normalize `bytes` into a grayscale, contrast-stretched, sharpened PNG
pub fn normalize(
    bytes: &[u8],
    output_path: &Path,
    config: &NormalizeConfig,
) -> Result<(), NormalizeError> {
    let decoded = image::load_from_memory(bytes)?;
    let gray = decoded.to_luma8();
    let (width, height) = gray.dimensions();

    let target_width =
        ((width as f32 * config.scale).round() as u32).clamp(config.min_width, config.max_width);
    let target_height =
        ((target_width as f64 / width as f64) * height as f64).round().max(1.0) as u32;

    debug!(
        original = format!("{}x{}", width, height),
        target = format!("{}x{}", target_width, target_height),
        "Normalizing image for recognition"
    );

    let resized = imageops::resize(&gray, target_width, target_height, FilterType::Lanczos3);
    let stretched = stretch_contrast(resized);
    let sharpened = imageops::unsharpen(
        &stretched,
        config.sharpen_sigma,
        config.sharpen_threshold,
    );

    DynamicImage::ImageLuma8(sharpened).save_with_format(output_path, ImageFormat::Png)?;
    Ok(())
}

/// Linear min/max stretch of the luma histogram
///
/// A flat image (min == max) is returned unchanged.
fn stretch_contrast(mut image: GrayImage) -> GrayImage {
    let (mut min, mut max) = (u8::MAX, u8::MIN);
    for pixel in image.pixels() {
        min = min.min(pixel.0[0]);
        max = max.max(pixel.0[0]);
    }
    if min >= max {
        return image;
    }

    let range = f32::from(max - min);
    for pixel in image.pixels_mut() {
        let value = f32::from(pixel.0[0] - min) / range * 255.0;
        pixel.0[0] = value.round() as u8;
    }
    image
}
