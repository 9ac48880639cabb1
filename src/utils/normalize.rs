//! Buffer normalization
//!
//! Brings a decoded image into the compositor's working form: longer side
//! bounded by the requested maximum, BGRA8 layout, orientation resolved so
//! pixel data is stored upright.

use crate::error::{CompositeError, Result};
use crate::types::{Orientation, PixelBuffer};
use crate::utils::validation::NumericValidator;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};
use tracing::{debug, instrument};

/// Normalizes decoded images into upright BGRA8 pixel buffers
pub struct BufferNormalizer;

impl BufferNormalizer {
    /// Normalize a decoded image
    ///
    /// The source image is left untouched. Images whose longer side is
    /// already within `max_dimension` keep their size; larger ones are
    /// downsampled with a triangle filter, preserving aspect ratio.
    ///
    /// # Errors
    /// - `LoadFailure` for images with a zero dimension
    /// - `InvalidConfig` for `max_dimension == Some(0)`
    #[instrument(skip(image), fields(width = image.width(), height = image.height()))]
    pub fn normalize(
        image: &DynamicImage,
        orientation: Orientation,
        max_dimension: Option<u32>,
    ) -> Result<PixelBuffer> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(CompositeError::load(format!(
                "Decoded image has empty dimensions {}x{}",
                width, height
            )));
        }

        let (target_width, target_height) = Self::target_dimensions((width, height), max_dimension)?;
        let buffer = if (target_width, target_height) == (width, height) {
            PixelBuffer::from_dynamic_image(image)?
        } else {
            debug!(
                "Downsampling {}x{} to {}x{}",
                width, height, target_width, target_height
            );
            let resized = image.resize_exact(target_width, target_height, FilterType::Triangle);
            PixelBuffer::from_dynamic_image(&resized)?
        };

        if orientation != Orientation::Upright {
            debug!(?orientation, "Resolving stored orientation");
        }
        Ok(buffer.with_orientation(orientation).into_upright())
    }

    /// Dimensions after bounding the longer side by `max_dimension`
    ///
    /// Never upsamples. Each side is rounded to the nearest pixel and kept at
    /// least 1.
    pub fn target_dimensions(
        (width, height): (u32, u32),
        max_dimension: Option<u32>,
    ) -> Result<(u32, u32)> {
        let Some(max_dimension) = max_dimension else {
            return Ok((width, height));
        };
        NumericValidator::validate_positive(max_dimension, "Max dimension")?;

        let longer = width.max(height);
        if longer <= max_dimension {
            return Ok((width, height));
        }

        let scale = max_dimension as f32 / longer as f32;
        let scaled_width = NumericValidator::round_f32_to_u32(width as f32 * scale)?.max(1);
        let scaled_height = NumericValidator::round_f32_to_u32(height as f32 * scale)?.max(1);
        Ok((
            scaled_width.min(max_dimension),
            scaled_height.min(max_dimension),
        ))
    }
}
