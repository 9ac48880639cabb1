//! Background cropping and cover fitting

use crate::config::{BackgroundFit, CropAnchor};
use crate::error::Result;
use crate::types::{PixelBuffer, BYTES_PER_PIXEL};
use crate::utils::validation::DimensionValidator;
use image::imageops::FilterType;
use tracing::debug;

/// Background brought to the subject's exact frame
#[derive(Debug, Clone)]
pub struct FittedBackground {
    /// Buffer with the subject's width and height
    pub buffer: PixelBuffer,
    /// Top-left corner of the crop window in the (possibly rescaled) background
    pub offset: (u32, u32),
}

/// Crops (and optionally rescales) backgrounds to the subject footprint
pub struct BackgroundFitter;

impl BackgroundFitter {
    /// Top-left corner of a `target`-sized window placed in `container`
    #[must_use]
    pub fn anchor_offset(anchor: CropAnchor, container: (u32, u32), target: (u32, u32)) -> (u32, u32) {
        let free_x = container.0.saturating_sub(target.0);
        let free_y = container.1.saturating_sub(target.1);

        let x = match anchor {
            CropAnchor::TopLeft | CropAnchor::Left | CropAnchor::BottomLeft => 0,
            CropAnchor::Top | CropAnchor::Center | CropAnchor::Bottom => free_x / 2,
            CropAnchor::TopRight | CropAnchor::Right | CropAnchor::BottomRight => free_x,
        };
        let y = match anchor {
            CropAnchor::TopLeft | CropAnchor::Top | CropAnchor::TopRight => 0,
            CropAnchor::Left | CropAnchor::Center | CropAnchor::Right => free_y / 2,
            CropAnchor::BottomLeft | CropAnchor::Bottom | CropAnchor::BottomRight => free_y,
        };
        (x, y)
    }

    /// Copy the anchored `target`-sized window out of `background`
    ///
    /// The result is tightly packed and keeps the background's channel
    /// order. Never resamples.
    ///
    /// # Errors
    /// - `DimensionMismatch` when the background is smaller than `target`
    pub fn crop(
        background: &PixelBuffer,
        target: (u32, u32),
        anchor: CropAnchor,
    ) -> Result<FittedBackground> {
        DimensionValidator::ensure_covers(target, background.dimensions())?;

        let offset = Self::anchor_offset(anchor, background.dimensions(), target);
        let (target_width, target_height) = target;
        let row_bytes = target_width as usize * BYTES_PER_PIXEL;
        let start = offset.0 as usize * BYTES_PER_PIXEL;

        let mut data = Vec::with_capacity(row_bytes * target_height as usize);
        for y in 0..target_height {
            if let Some(window) = background
                .row(offset.1 + y)
                .and_then(|row| row.get(start..start + row_bytes))
            {
                data.extend_from_slice(window);
            }
        }

        let buffer = PixelBuffer::from_raw(
            data,
            target_width,
            target_height,
            row_bytes,
            background.format(),
        )?;
        Ok(FittedBackground { buffer, offset })
    }

    /// Downscale `background` to the smallest size that still covers `target`
    ///
    /// Backgrounds that already fit tightly in one axis are returned as-is.
    ///
    /// # Errors
    /// - `DimensionMismatch` when the background is smaller than `target`
    pub fn cover(background: &PixelBuffer, target: (u32, u32)) -> Result<PixelBuffer> {
        DimensionValidator::ensure_covers(target, background.dimensions())?;

        let (width, height) = background.dimensions();
        let scale = (target.0 as f64 / width as f64).max(target.1 as f64 / height as f64);
        let scaled_width = ((width as f64 * scale).ceil() as u32).clamp(target.0, width);
        let scaled_height = ((height as f64 * scale).ceil() as u32).clamp(target.1, height);

        if (scaled_width, scaled_height) == (width, height) {
            return Ok(background.clone());
        }

        debug!(
            "Cover-scaling background {}x{} to {}x{}",
            width, height, scaled_width, scaled_height
        );
        let resized = image::imageops::resize(
            &background.to_rgba_image(),
            scaled_width,
            scaled_height,
            FilterType::Triangle,
        );
        Ok(PixelBuffer::from_rgba_image(&resized)?.into_format(background.format()))
    }

    /// Validate, optionally cover-scale, then crop to `target`
    pub fn fit(
        background: &PixelBuffer,
        target: (u32, u32),
        fit: BackgroundFit,
        anchor: CropAnchor,
    ) -> Result<FittedBackground> {
        DimensionValidator::ensure_covers(target, background.dimensions())?;
        match fit {
            BackgroundFit::Crop => Self::crop(background, target, anchor),
            BackgroundFit::Cover => Self::crop(&Self::cover(background, target)?, target, anchor),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn gradient(width: u32, height: u32) -> PixelBuffer {
        let mut buffer = PixelBuffer::new(width, height).unwrap();
        for y in 0..height {
            for x in 0..width {
                buffer
                    .set_pixel(x, y, [x as u8, y as u8, 0, 255])
                    .unwrap();
            }
        }
        buffer
    }

    #[test]
    fn test_center_crop_picks_middle() {
        let background = gradient(200, 200);
        let fitted = BackgroundFitter::crop(&background, (100, 100), CropAnchor::Center).unwrap();
        assert_eq!(fitted.buffer.dimensions(), (100, 100));
        assert_eq!(fitted.offset, (50, 50));
        assert_eq!(fitted.buffer.pixel(0, 0), background.pixel(50, 50));
        assert_eq!(fitted.buffer.pixel(99, 99), background.pixel(149, 149));
    }

    #[test]
    fn test_anchor_offsets() {
        let container = (300, 200);
        let target = (100, 100);
        assert_eq!(BackgroundFitter::anchor_offset(CropAnchor::TopLeft, container, target), (0, 0));
        assert_eq!(BackgroundFitter::anchor_offset(CropAnchor::Top, container, target), (100, 0));
        assert_eq!(
            BackgroundFitter::anchor_offset(CropAnchor::BottomRight, container, target),
            (200, 100)
        );
        assert_eq!(BackgroundFitter::anchor_offset(CropAnchor::Left, container, target), (0, 50));
        // odd slack rounds toward the top-left
        assert_eq!(
            BackgroundFitter::anchor_offset(CropAnchor::Center, (5, 5), (2, 2)),
            (1, 1)
        );
    }

    #[test]
    fn test_crop_respects_source_stride() {
        let mut data = vec![0u8; 3 * 32];
        // pixel (1, 2) in a 3x3 buffer with a 32-byte stride
        data[2 * 32 + 4..2 * 32 + 8].copy_from_slice(&[7, 8, 9, 255]);
        let background =
            PixelBuffer::from_raw(data, 3, 3, 32, crate::types::PixelFormat::Bgra8).unwrap();
        let fitted = BackgroundFitter::crop(&background, (1, 1), CropAnchor::Bottom).unwrap();
        assert_eq!(fitted.offset, (1, 2));
        assert_eq!(fitted.buffer.pixel(0, 0), Some([7, 8, 9, 255]));
        assert_eq!(fitted.buffer.bytes_per_row(), 4);
    }

    #[test]
    fn test_crop_rejects_small_background() {
        let background = gradient(50, 200);
        let err = BackgroundFitter::crop(&background, (100, 100), CropAnchor::Center).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DimensionMismatch);
    }

    #[test]
    fn test_cover_downscales_to_smallest_covering_size() {
        let background = gradient(400, 200);
        let covered = BackgroundFitter::cover(&background, (100, 100)).unwrap();
        assert_eq!(covered.dimensions(), (200, 100));

        let fitted =
            BackgroundFitter::fit(&background, (100, 100), BackgroundFit::Cover, CropAnchor::Center)
                .unwrap();
        assert_eq!(fitted.buffer.dimensions(), (100, 100));
        assert_eq!(fitted.offset, (50, 0));
    }

    #[test]
    fn test_cover_never_upscales() {
        let background = gradient(120, 100);
        let covered = BackgroundFitter::cover(&background, (100, 100)).unwrap();
        assert_eq!(covered.dimensions(), (120, 100));

        let small = gradient(80, 80);
        assert!(BackgroundFitter::fit(&small, (100, 100), BackgroundFit::Cover, CropAnchor::Center)
            .is_err());
    }
}
