//! Core types for background replacement operations

use crate::error::{CompositeError, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use image::{DynamicImage, GrayImage, ImageBuffer, Luma, RgbaImage};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Bytes used by one pixel in every supported layout
pub const BYTES_PER_PIXEL: usize = 4;

/// Byte order of the four channels of a pixel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelFormat {
    /// Blue, green, red, alpha (the compositor's working layout)
    Bgra8,
    /// Red, green, blue, alpha
    Rgba8,
}

impl PixelFormat {
    /// Byte offsets of the (red, green, blue, alpha) channels within a pixel
    #[must_use]
    pub fn channel_offsets(self) -> (usize, usize, usize, usize) {
        match self {
            Self::Bgra8 => (2, 1, 0, 3),
            Self::Rgba8 => (0, 1, 2, 3),
        }
    }
}

impl std::fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bgra8 => write!(f, "BGRA8"),
            Self::Rgba8 => write!(f, "RGBA8"),
        }
    }
}

/// Transform that must be applied to stored pixels to display them upright
///
/// Mirrored variants rotate clockwise first, then flip horizontally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Orientation {
    /// Stored top-left origin, no transform needed
    #[default]
    Upright,
    /// Rotate 90° clockwise
    Rotated90,
    /// Rotate 180°
    Rotated180,
    /// Rotate 270° clockwise
    Rotated270,
    /// Flip horizontally
    Mirrored,
    /// Rotate 90° clockwise, then flip horizontally (transpose)
    MirroredRotated90,
    /// Rotate 180°, then flip horizontally (vertical flip)
    MirroredRotated180,
    /// Rotate 270° clockwise, then flip horizontally (transverse)
    MirroredRotated270,
}

impl Orientation {
    /// Map an EXIF orientation tag value (1-8)
    #[must_use]
    pub fn from_exif(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Upright),
            2 => Some(Self::Mirrored),
            3 => Some(Self::Rotated180),
            4 => Some(Self::MirroredRotated180),
            5 => Some(Self::MirroredRotated90),
            6 => Some(Self::Rotated90),
            7 => Some(Self::MirroredRotated270),
            8 => Some(Self::Rotated270),
            _ => None,
        }
    }

    /// Whether resolving this orientation swaps width and height
    #[must_use]
    pub fn swaps_dimensions(self) -> bool {
        matches!(
            self,
            Self::Rotated90 | Self::Rotated270 | Self::MirroredRotated90 | Self::MirroredRotated270
        )
    }

    /// Stored coordinate that lands on upright coordinate `(x, y)`
    ///
    /// `width` and `height` are the stored (pre-transform) dimensions.
    #[must_use]
    pub fn source_coordinate(self, x: u32, y: u32, width: u32, height: u32) -> (u32, u32) {
        let last_x = width.saturating_sub(1);
        let last_y = height.saturating_sub(1);
        match self {
            Self::Upright => (x, y),
            Self::Rotated90 => (y, last_y.saturating_sub(x)),
            Self::Rotated180 => (last_x.saturating_sub(x), last_y.saturating_sub(y)),
            Self::Rotated270 => (last_x.saturating_sub(y), x),
            Self::Mirrored => (last_x.saturating_sub(x), y),
            Self::MirroredRotated90 => (y, x),
            Self::MirroredRotated180 => (x, last_y.saturating_sub(y)),
            Self::MirroredRotated270 => (last_x.saturating_sub(y), last_y.saturating_sub(x)),
        }
    }
}

impl From<image::metadata::Orientation> for Orientation {
    fn from(orientation: image::metadata::Orientation) -> Self {
        use image::metadata::Orientation as Exif;
        match orientation {
            Exif::NoTransforms => Self::Upright,
            Exif::Rotate90 => Self::Rotated90,
            Exif::Rotate180 => Self::Rotated180,
            Exif::Rotate270 => Self::Rotated270,
            Exif::FlipHorizontal => Self::Mirrored,
            Exif::FlipVertical => Self::MirroredRotated180,
            Exif::Rotate90FlipH => Self::MirroredRotated90,
            Exif::Rotate270FlipH => Self::MirroredRotated270,
        }
    }
}

/// Owned W×H grid of 4-byte pixels with an explicit row stride
///
/// Invariants: `width > 0`, `height > 0`, `bytes_per_row >= width * 4`,
/// `data.len() >= bytes_per_row * height`. Padding bytes at the end of each
/// row are preserved but never interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    data: Vec<u8>,
    width: u32,
    height: u32,
    bytes_per_row: usize,
    format: PixelFormat,
    orientation: Orientation,
}

impl PixelBuffer {
    /// Create a zeroed, tightly packed BGRA8 buffer
    pub fn new(width: u32, height: u32) -> Result<Self> {
        Self::with_row_alignment(width, height, 1)
    }

    /// Create a zeroed BGRA8 buffer whose rows are padded to `alignment` bytes
    pub fn with_row_alignment(width: u32, height: u32, alignment: usize) -> Result<Self> {
        if alignment == 0 {
            return Err(CompositeError::format("Row alignment must be at least 1 byte"));
        }
        let packed = Self::packed_row_bytes(width)?;
        let bytes_per_row = packed.div_ceil(alignment) * alignment;
        let len = bytes_per_row
            .checked_mul(height as usize)
            .ok_or_else(|| CompositeError::format("Pixel buffer size overflows usize"))?;
        Self::from_raw(vec![0; len], width, height, bytes_per_row, PixelFormat::Bgra8)
    }

    /// Wrap an existing byte region
    ///
    /// # Errors
    /// - Zero width or height
    /// - `bytes_per_row` smaller than `width * 4`
    /// - `data` shorter than `bytes_per_row * height`
    pub fn from_raw(
        data: Vec<u8>,
        width: u32,
        height: u32,
        bytes_per_row: usize,
        format: PixelFormat,
    ) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(CompositeError::format(format!(
                "Pixel buffer dimensions must be positive, got {}x{}",
                width, height
            )));
        }
        let packed = Self::packed_row_bytes(width)?;
        if bytes_per_row < packed {
            return Err(CompositeError::format(format!(
                "Row stride {} is smaller than {} bytes required for width {}",
                bytes_per_row, packed, width
            )));
        }
        let required = bytes_per_row
            .checked_mul(height as usize)
            .ok_or_else(|| CompositeError::format("Pixel buffer size overflows usize"))?;
        if data.len() < required {
            return Err(CompositeError::format(format!(
                "Pixel data holds {} bytes, {}x{} with stride {} needs {}",
                data.len(),
                width,
                height,
                bytes_per_row,
                required
            )));
        }
        Ok(Self {
            data,
            width,
            height,
            bytes_per_row,
            format,
            orientation: Orientation::Upright,
        })
    }

    /// Copy an RGBA image into a tightly packed BGRA8 buffer
    pub fn from_rgba_image(image: &RgbaImage) -> Result<Self> {
        let mut data = image.as_raw().clone();
        for pixel in data.chunks_exact_mut(BYTES_PER_PIXEL) {
            pixel.swap(0, 2);
        }
        let bytes_per_row = image.width() as usize * BYTES_PER_PIXEL;
        Self::from_raw(
            data,
            image.width(),
            image.height(),
            bytes_per_row,
            PixelFormat::Bgra8,
        )
    }

    /// Convert any decoded image into a BGRA8 buffer
    pub fn from_dynamic_image(image: &DynamicImage) -> Result<Self> {
        Self::from_rgba_image(&image.to_rgba8())
    }

    fn packed_row_bytes(width: u32) -> Result<usize> {
        (width as usize)
            .checked_mul(BYTES_PER_PIXEL)
            .ok_or_else(|| CompositeError::format("Row size overflows usize"))
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Byte distance between the starts of consecutive rows
    #[must_use]
    pub fn bytes_per_row(&self) -> usize {
        self.bytes_per_row
    }

    #[must_use]
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    #[must_use]
    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    /// Record the orientation metadata carried by the source
    #[must_use]
    pub fn with_orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = orientation;
        self
    }

    /// Raw bytes of the whole buffer, padding included
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Mutable view over exactly `bytes_per_row * height` bytes
    ///
    /// Splitting this slice into `bytes_per_row` chunks yields one chunk per
    /// row, which is what row-parallel consumers rely on.
    pub fn rows_region_mut(&mut self) -> &mut [u8] {
        let end = self.bytes_per_row * self.height as usize;
        let len = self.data.len();
        &mut self.data[..end.min(len)]
    }

    /// Pixel bytes of row `y` without trailing padding
    #[must_use]
    pub fn row(&self, y: u32) -> Option<&[u8]> {
        if y >= self.height {
            return None;
        }
        let start = y as usize * self.bytes_per_row;
        self.data
            .get(start..start + self.width as usize * BYTES_PER_PIXEL)
    }

    /// Mutable pixel bytes of row `y` without trailing padding
    pub fn row_mut(&mut self, y: u32) -> Option<&mut [u8]> {
        if y >= self.height {
            return None;
        }
        let start = y as usize * self.bytes_per_row;
        let end = start + self.width as usize * BYTES_PER_PIXEL;
        self.data.get_mut(start..end)
    }

    /// Pixel bytes at `(x, y)` in this buffer's channel order
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width {
            return None;
        }
        let row = self.row(y)?;
        let offset = x as usize * BYTES_PER_PIXEL;
        row.get(offset..offset + BYTES_PER_PIXEL)
            .and_then(|bytes| <[u8; 4]>::try_from(bytes).ok())
    }

    /// Overwrite the pixel at `(x, y)` with bytes in this buffer's channel order
    pub fn set_pixel(&mut self, x: u32, y: u32, value: [u8; 4]) -> Result<()> {
        let (width, height) = self.dimensions();
        let offset = x as usize * BYTES_PER_PIXEL;
        self.row_mut(y)
            .and_then(|row| row.get_mut(offset..offset + BYTES_PER_PIXEL))
            .map(|bytes| bytes.copy_from_slice(&value))
            .ok_or_else(|| {
                CompositeError::format(format!(
                    "Pixel ({}, {}) is outside {}x{} buffer",
                    x, y, width, height
                ))
            })
    }

    /// Pixel at `(x, y)` as `[r, g, b, a]` regardless of storage order
    #[must_use]
    pub fn rgba(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        let bytes = self.pixel(x, y)?;
        let (r, g, b, a) = self.format.channel_offsets();
        Some([bytes[r], bytes[g], bytes[b], bytes[a]])
    }

    /// Copy into a tightly packed `RgbaImage`
    #[must_use]
    pub fn to_rgba_image(&self) -> RgbaImage {
        let mut image = RgbaImage::new(self.width, self.height);
        for (y, row) in image.rows_mut().enumerate() {
            for (x, pixel) in row.enumerate() {
                if let Some(rgba) = self.rgba(x as u32, y as u32) {
                    pixel.0 = rgba;
                }
            }
        }
        image
    }

    /// Reorder channels into `format`, keeping geometry and stride
    #[must_use]
    pub fn into_format(mut self, format: PixelFormat) -> Self {
        if self.format == format {
            return self;
        }
        let stride = self.bytes_per_row;
        let packed = self.width as usize * BYTES_PER_PIXEL;
        for row in self.rows_region_mut().chunks_mut(stride) {
            let end = packed.min(row.len());
            for pixel in row[..end].chunks_exact_mut(BYTES_PER_PIXEL) {
                pixel.swap(0, 2);
            }
        }
        self.format = format;
        self
    }

    /// Resolve the orientation metadata so pixel data is stored upright
    ///
    /// Returns a tightly packed buffer with `Orientation::Upright`. Buffers
    /// that are already upright are returned untouched.
    #[must_use]
    pub fn into_upright(self) -> Self {
        let orientation = self.orientation;
        if orientation == Orientation::Upright {
            return self;
        }

        let (src_width, src_height) = self.dimensions();
        let (width, height) = if orientation.swaps_dimensions() {
            (src_height, src_width)
        } else {
            (src_width, src_height)
        };
        let bytes_per_row = width as usize * BYTES_PER_PIXEL;
        let mut data = vec![0u8; bytes_per_row * height as usize];

        for (y, row) in data.chunks_exact_mut(bytes_per_row).enumerate() {
            for (x, pixel) in row.chunks_exact_mut(BYTES_PER_PIXEL).enumerate() {
                let (sx, sy) =
                    orientation.source_coordinate(x as u32, y as u32, src_width, src_height);
                if let Some(source) = self.pixel(sx, sy) {
                    pixel.copy_from_slice(&source);
                }
            }
        }

        Self {
            data,
            width,
            height,
            bytes_per_row,
            format: self.format,
            orientation: Orientation::Upright,
        }
    }
}

/// Foreground probability per subject pixel
///
/// Values are expected in `[0.0, 1.0]`; providers that emit anything else
/// violate their contract. The row stride is counted in `f32` elements and
/// may exceed `width`.
#[derive(Debug, Clone, PartialEq)]
pub struct Mask {
    data: Vec<f32>,
    width: u32,
    height: u32,
    row_stride: usize,
}

impl Mask {
    /// Create a tightly packed mask from row-major values
    pub fn new(width: u32, height: u32, data: Vec<f32>) -> Result<Self> {
        Self::with_stride(width, height, width as usize, data)
    }

    /// Create a mask whose rows are `row_stride` elements apart
    pub fn with_stride(width: u32, height: u32, row_stride: usize, data: Vec<f32>) -> Result<Self> {
        if row_stride < width as usize {
            return Err(CompositeError::format(format!(
                "Mask stride {} is smaller than width {}",
                row_stride, width
            )));
        }
        let required = row_stride
            .checked_mul(height as usize)
            .ok_or_else(|| CompositeError::format("Mask size overflows usize"))?;
        if data.len() < required {
            return Err(CompositeError::format(format!(
                "Mask holds {} values, {}x{} with stride {} needs {}",
                data.len(),
                width,
                height,
                row_stride,
                required
            )));
        }
        Ok(Self {
            data,
            width,
            height,
            row_stride,
        })
    }

    /// Mask with every value set to `value`
    #[must_use]
    pub fn filled(width: u32, height: u32, value: f32) -> Self {
        Self {
            data: vec![value; width as usize * height as usize],
            width,
            height,
            row_stride: width as usize,
        }
    }

    /// Build a mask by evaluating `f(x, y)` for every pixel
    pub fn from_fn<F: FnMut(u32, u32) -> f32>(width: u32, height: u32, mut f: F) -> Self {
        let mut data = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                data.push(f(x, y));
            }
        }
        Self {
            data,
            width,
            height,
            row_stride: width as usize,
        }
    }

    /// Interpret an 8-bit grayscale image as a mask (255 = foreground)
    #[must_use]
    pub fn from_luma(image: &GrayImage) -> Self {
        let data = image
            .as_raw()
            .iter()
            .map(|&v| f32::from(v) / 255.0)
            .collect();
        Self {
            data,
            width: image.width(),
            height: image.height(),
            row_stride: image.width() as usize,
        }
    }

    /// Render the mask as an 8-bit grayscale image
    #[must_use]
    pub fn to_luma(&self) -> GrayImage {
        GrayImage::from_fn(self.width, self.height, |x, y| {
            let v = self.value(x, y).unwrap_or(0.0);
            Luma([(v.clamp(0.0, 1.0) * 255.0).round() as u8])
        })
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Distance between row starts, in elements
    #[must_use]
    pub fn row_stride(&self) -> usize {
        self.row_stride
    }

    /// Distance between row starts, in bytes
    #[must_use]
    pub fn bytes_per_row(&self) -> usize {
        self.row_stride * std::mem::size_of::<f32>()
    }

    /// Values of row `y` without trailing padding
    #[must_use]
    pub fn row(&self, y: u32) -> Option<&[f32]> {
        if y >= self.height {
            return None;
        }
        let start = y as usize * self.row_stride;
        self.data.get(start..start + self.width as usize)
    }

    /// Foreground weight at `(x, y)`
    #[must_use]
    pub fn value(&self, x: u32, y: u32) -> Option<f32> {
        self.row(y)?.get(x as usize).copied()
    }

    /// Hard-threshold the mask: `>= threshold` becomes 1.0, everything else 0.0
    #[must_use]
    pub fn binarize(&self, threshold: f32) -> Self {
        Self::from_fn(self.width, self.height, |x, y| {
            if self.value(x, y).unwrap_or(0.0) >= threshold {
                1.0
            } else {
                0.0
            }
        })
    }

    /// Resample to `width`×`height` with bilinear filtering, clamped to [0, 1]
    #[must_use]
    pub fn resized(&self, width: u32, height: u32) -> Self {
        if (width, height) == self.dimensions() {
            return self.clone();
        }
        let source: ImageBuffer<Luma<f32>, Vec<f32>> =
            ImageBuffer::from_fn(self.width, self.height, |x, y| {
                Luma([self.value(x, y).unwrap_or(0.0)])
            });
        let resized =
            image::imageops::resize(&source, width, height, image::imageops::FilterType::Triangle);
        let data = resized
            .into_raw()
            .into_iter()
            .map(|v| v.clamp(0.0, 1.0))
            .collect();
        Self {
            data,
            width,
            height,
            row_stride: width as usize,
        }
    }

    /// Number of values that are NaN or outside [0, 1]
    #[must_use]
    pub fn out_of_range_count(&self) -> usize {
        (0..self.height)
            .filter_map(|y| self.row(y))
            .flat_map(|row| row.iter())
            .filter(|v| !(0.0..=1.0).contains(*v))
            .count()
    }

    /// Mean foreground weight over the whole mask
    #[must_use]
    pub fn coverage(&self) -> f32 {
        let count = self.width as usize * self.height as usize;
        if count == 0 {
            return 0.0;
        }
        let sum: f64 = (0..self.height)
            .filter_map(|y| self.row(y))
            .flat_map(|row| row.iter())
            .map(|&v| f64::from(v))
            .sum();
        (sum / count as f64) as f32
    }
}

/// Anything the loader can decode into a bitmap
#[derive(Debug, Clone)]
pub enum ImageSource {
    /// Local file path
    Path(PathBuf),
    /// `file://` URI
    Uri(String),
    /// Base64 payload, optionally prefixed with a `data:` URI header
    Base64(String),
    /// Encoded image bytes
    Bytes(Vec<u8>),
    /// Already decoded image (treated as upright)
    Image(DynamicImage),
}

impl ImageSource {
    /// Classify a string the way mobile bridges hand them over
    ///
    /// `data:` URIs are base64 payloads and anything with a scheme is a URI.
    /// A bare string is a file path when that file exists, otherwise a base64
    /// payload if it decodes as one, otherwise still a path.
    #[must_use]
    pub fn parse(input: &str) -> Self {
        let trimmed = input.trim();
        if trimmed.starts_with("data:") {
            Self::Base64(trimmed.to_string())
        } else if trimmed.contains("://") {
            Self::Uri(trimmed.to_string())
        } else if !Path::new(trimmed).exists() && Self::is_base64_payload(trimmed) {
            Self::Base64(trimmed.to_string())
        } else {
            Self::Path(PathBuf::from(trimmed))
        }
    }

    fn is_base64_payload(input: &str) -> bool {
        let compact: String = input.chars().filter(|c| !c.is_whitespace()).collect();
        STANDARD
            .decode(compact)
            .is_ok_and(|bytes| !bytes.is_empty())
    }

    /// Short human-readable description for logs and errors
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Path(path) => format!("file '{}'", path.display()),
            Self::Uri(uri) => format!("URI '{}'", uri),
            Self::Base64(data) => format!("base64 string ({} chars)", data.len()),
            Self::Bytes(bytes) => format!("byte buffer ({} bytes)", bytes.len()),
            Self::Image(image) => format!("in-memory image {}x{}", image.width(), image.height()),
        }
    }
}

impl From<PathBuf> for ImageSource {
    fn from(path: PathBuf) -> Self {
        Self::Path(path)
    }
}

impl From<&Path> for ImageSource {
    fn from(path: &Path) -> Self {
        Self::Path(path.to_path_buf())
    }
}

impl From<&str> for ImageSource {
    fn from(input: &str) -> Self {
        Self::parse(input)
    }
}

impl From<String> for ImageSource {
    fn from(input: String) -> Self {
        Self::parse(&input)
    }
}

impl From<Vec<u8>> for ImageSource {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(bytes)
    }
}

impl From<DynamicImage> for ImageSource {
    fn from(image: DynamicImage) -> Self {
        Self::Image(image)
    }
}

/// Serialized output handed back to the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSink {
    /// Encoded image written to this path
    File(PathBuf),
    /// Bare base64 payload
    Base64(String),
    /// `data:<mime>;base64,<payload>` string
    DataUri(String),
}

impl ImageSink {
    /// Path of the persisted file, if the output went to disk
    #[must_use]
    pub fn as_path(&self) -> Option<&Path> {
        match self {
            Self::File(path) => Some(path),
            Self::Base64(_) | Self::DataUri(_) => None,
        }
    }

    /// Inline payload, if the output was encoded to a string
    #[must_use]
    pub fn as_inline(&self) -> Option<&str> {
        match self {
            Self::File(_) => None,
            Self::Base64(data) | Self::DataUri(data) => Some(data),
        }
    }
}

impl std::fmt::Display for ImageSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File(path) => write!(f, "file://{}", path.display()),
            Self::Base64(data) | Self::DataUri(data) => f.write_str(data),
        }
    }
}

/// One compositing invocation: consumed once by the processor
#[derive(Debug, Clone)]
pub struct CompositeRequest {
    /// Selfie whose background gets replaced
    pub subject: ImageSource,
    /// Replacement background
    pub background: ImageSource,
    /// Bound on the longer side of both images (overrides the config value)
    pub max_dimension: Option<u32>,
}

impl CompositeRequest {
    pub fn new<S: Into<ImageSource>, B: Into<ImageSource>>(subject: S, background: B) -> Self {
        Self {
            subject: subject.into(),
            background: background.into(),
            max_dimension: None,
        }
    }

    #[must_use]
    pub fn with_max_dimension(mut self, max_dimension: u32) -> Self {
        self.max_dimension = Some(max_dimension);
        self
    }
}

/// Detailed timing breakdown for one composite
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingTimings {
    /// Provider initialization (first call only)
    pub provider_init_ms: u64,
    /// Reading and decoding both sources
    pub image_decode_ms: u64,
    /// Downsampling and orientation resolution
    pub normalization_ms: u64,
    /// Mask generation
    pub segmentation_ms: u64,
    /// Dimension validation and background cropping
    pub background_fit_ms: u64,
    /// Per-pixel compositing
    pub compositing_ms: u64,
    /// Output encoding (if serialized)
    pub image_encode_ms: Option<u64>,
    /// Total end-to-end processing time
    pub total_ms: u64,
}

impl ProcessingTimings {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// One-line summary for logs
    #[must_use]
    pub fn summary(&self) -> String {
        let mut summary = format!(
            "Total: {}ms | Decode: {}ms | Normalize: {}ms | Segment: {}ms | Fit: {}ms | Composite: {}ms",
            self.total_ms,
            self.image_decode_ms,
            self.normalization_ms,
            self.segmentation_ms,
            self.background_fit_ms,
            self.compositing_ms
        );
        if let Some(encode_ms) = self.image_encode_ms {
            summary.push_str(&format!(" | Encode: {}ms", encode_ms));
        }
        summary
    }
}

/// Metadata describing how a composite was produced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingMetadata {
    /// Mask provider used
    pub provider: String,
    /// Subject dimensions after normalization
    pub subject_dimensions: (u32, u32),
    /// Background dimensions after normalization, before cropping
    pub background_dimensions: (u32, u32),
    /// Top-left corner of the crop window inside the background
    pub crop_offset: (u32, u32),
    /// Mean foreground weight of the mask
    pub mask_coverage: f32,
    /// When the composite finished
    pub created_at: DateTime<Utc>,
    /// Detailed timing breakdown
    pub timings: ProcessingTimings,
}

impl ProcessingMetadata {
    #[must_use]
    pub fn new(provider: String) -> Self {
        Self {
            provider,
            subject_dimensions: (0, 0),
            background_dimensions: (0, 0),
            crop_offset: (0, 0),
            mask_coverage: 0.0,
            created_at: Utc::now(),
            timings: ProcessingTimings::default(),
        }
    }
}

/// Finished composite: the subject buffer with its background replaced
#[derive(Debug, Clone)]
pub struct CompositeResult {
    /// Composited pixels, same dimensions as the subject
    pub image: PixelBuffer,
    /// Mask the composite was driven by
    pub mask: Mask,
    /// Processing metadata
    pub metadata: ProcessingMetadata,
}

impl CompositeResult {
    #[must_use]
    pub fn new(image: PixelBuffer, mask: Mask, metadata: ProcessingMetadata) -> Self {
        Self {
            image,
            mask,
            metadata,
        }
    }

    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    #[must_use]
    pub fn timings(&self) -> &ProcessingTimings {
        &self.metadata.timings
    }

    /// Composite as an `RgbaImage` (subject alpha preserved)
    #[must_use]
    pub fn to_rgba_image(&self) -> RgbaImage {
        self.image.to_rgba_image()
    }
}
