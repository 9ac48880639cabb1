//! Output format handling service
//!
//! Turns a finished pixel buffer into encoded bytes. Encoding never touches
//! the filesystem; persistence lives in [`crate::services::io`].

use crate::{
    config::OutputFormat,
    error::{CompositeError, Result},
    types::PixelBuffer,
};
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat, RgbaImage};
use std::io::Cursor;
use tracing::debug;

/// Service for handling output format conversions
pub struct OutputFormatHandler;

impl OutputFormatHandler {
    /// Convert an RGBA image to the pixel layout `format` stores
    ///
    /// JPEG drops the alpha channel; every other format keeps it.
    #[must_use]
    pub fn convert_format(rgba_image: RgbaImage, format: OutputFormat) -> DynamicImage {
        match format {
            OutputFormat::Jpeg => DynamicImage::ImageRgb8(DynamicImage::ImageRgba8(rgba_image).to_rgb8()),
            OutputFormat::Png | OutputFormat::WebP | OutputFormat::Tiff => {
                DynamicImage::ImageRgba8(rgba_image)
            },
        }
    }

    /// Encode `buffer` as `format`
    ///
    /// `jpeg_quality` is clamped to 1-100 and ignored by lossless formats.
    ///
    /// # Errors
    /// - `EncodeFailure` if the codec rejects the image
    /// - `EncodeFailure` for WebP when the `webp-support` feature is disabled
    pub fn encode(buffer: &PixelBuffer, format: OutputFormat, jpeg_quality: u8) -> Result<Vec<u8>> {
        let image = Self::convert_format(buffer.to_rgba_image(), format);
        let mut bytes = Vec::new();

        match format {
            OutputFormat::Jpeg => {
                let encoder = JpegEncoder::new_with_quality(&mut bytes, jpeg_quality.clamp(1, 100));
                image
                    .write_with_encoder(encoder)
                    .map_err(|e| CompositeError::encode(format!("JPEG encoding failed: {}", e)))?;
            },
            OutputFormat::Png => Self::write_with_format(&image, &mut bytes, ImageFormat::Png)?,
            OutputFormat::Tiff => Self::write_with_format(&image, &mut bytes, ImageFormat::Tiff)?,
            #[cfg(feature = "webp-support")]
            OutputFormat::WebP => Self::write_with_format(&image, &mut bytes, ImageFormat::WebP)?,
            #[cfg(not(feature = "webp-support"))]
            OutputFormat::WebP => {
                return Err(CompositeError::encode(
                    "WebP output requires the webp-support feature",
                ))
            },
        }

        debug!(
            "Encoded {}x{} composite as {} ({} bytes)",
            buffer.width(),
            buffer.height(),
            format,
            bytes.len()
        );
        Ok(bytes)
    }

    fn write_with_format(image: &DynamicImage, bytes: &mut Vec<u8>, format: ImageFormat) -> Result<()> {
        image
            .write_to(&mut Cursor::new(bytes), format)
            .map_err(|e| CompositeError::encode(format!("{:?} encoding failed: {}", format, e)))
    }

    /// Get the file extension for a given output format (without the dot)
    ///
    /// ```rust
    /// use selfie_bgreplace::{services::OutputFormatHandler, OutputFormat};
    ///
    /// assert_eq!(OutputFormatHandler::get_extension(OutputFormat::Jpeg), "jpg");
    /// ```
    #[must_use]
    pub fn get_extension(format: OutputFormat) -> &'static str {
        match format {
            OutputFormat::Jpeg => "jpg",
            OutputFormat::Png => "png",
            OutputFormat::WebP => "webp",
            OutputFormat::Tiff => "tiff",
        }
    }

    /// MIME type used in data URIs
    #[must_use]
    pub fn mime_type(format: OutputFormat) -> &'static str {
        match format {
            OutputFormat::Jpeg => "image/jpeg",
            OutputFormat::Png => "image/png",
            OutputFormat::WebP => "image/webp",
            OutputFormat::Tiff => "image/tiff",
        }
    }

    /// Whether `format` stores the alpha channel
    #[must_use]
    pub fn supports_transparency(format: OutputFormat) -> bool {
        !matches!(format, OutputFormat::Jpeg)
    }
}
