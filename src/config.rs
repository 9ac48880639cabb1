//! Configuration types for background replacement operations

use crate::error::{CompositeError, Result};
use crate::utils::validation::NumericValidator;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Output image format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OutputFormat {
    /// JPEG (alpha dropped, quality from `jpeg_quality`)
    #[default]
    Jpeg,
    /// PNG with alpha channel
    Png,
    /// Lossless WebP with alpha channel (requires the `webp-support` feature)
    WebP,
    /// TIFF with alpha channel
    Tiff,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Jpeg => write!(f, "jpeg"),
            Self::Png => write!(f, "png"),
            Self::WebP => write!(f, "webp"),
            Self::Tiff => write!(f, "tiff"),
        }
    }
}

/// Where the encoded composite goes
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OutputTarget {
    /// Inline `data:<mime>;base64,...` string
    #[default]
    DataUri,
    /// Inline base64 payload without a header
    Base64,
    /// Write to this exact path
    File(PathBuf),
    /// Write a uniquely named file into this directory
    Directory(PathBuf),
    /// Write a uniquely named file into the user cache directory
    CacheDirectory,
}

/// Which part of an oversized background is kept when cropping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CropAnchor {
    TopLeft,
    Top,
    TopRight,
    Left,
    /// Centered sub-rectangle
    #[default]
    Center,
    Right,
    BottomLeft,
    Bottom,
    BottomRight,
}

/// How the background is brought to the subject's size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BackgroundFit {
    /// Crop the normalized background, never resampling it
    #[default]
    Crop,
    /// Downscale to the smallest size that still covers the subject, then crop
    Cover,
}

/// Configuration for background replacement operations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositeConfig {
    /// Bound on the longer side of both images (None = keep source size)
    pub max_dimension: Option<u32>,

    /// Crop anchor used when the background is larger than the subject
    pub crop_anchor: CropAnchor,

    /// Background fitting strategy
    pub background_fit: BackgroundFit,

    /// Binarize the mask at this foreground weight (None = continuous blending)
    pub foreground_threshold: Option<f32>,

    /// Output format
    pub output_format: OutputFormat,

    /// JPEG quality (0-100, only used for JPEG output)
    pub jpeg_quality: u8,

    /// Output destination
    pub output_target: OutputTarget,

    /// Composite rows in parallel
    pub parallel: bool,

    /// Worker threads for parallel compositing (0 = global pool)
    pub num_threads: usize,

    /// Enable debug mode (mask range diagnostics)
    pub debug: bool,
}

impl Default for CompositeConfig {
    fn default() -> Self {
        Self {
            max_dimension: None,
            crop_anchor: CropAnchor::default(),
            background_fit: BackgroundFit::default(),
            foreground_threshold: None,
            output_format: OutputFormat::default(),
            jpeg_quality: 100,
            output_target: OutputTarget::default(),
            parallel: true,
            num_threads: 0,
            debug: false,
        }
    }
}

impl CompositeConfig {
    /// Create a new configuration builder
    ///
    /// ```rust
    /// use selfie_bgreplace::{CompositeConfig, CropAnchor, OutputFormat};
    ///
    /// let config = CompositeConfig::builder()
    ///     .max_dimension(1024)
    ///     .crop_anchor(CropAnchor::Top)
    ///     .output_format(OutputFormat::Png)
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(config.max_dimension, Some(1024));
    /// ```
    #[must_use]
    pub fn builder() -> CompositeConfigBuilder {
        CompositeConfigBuilder::default()
    }

    /// Parse and validate a JSON configuration
    ///
    /// Missing fields take their default values.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).map_err(|e| {
            CompositeError::invalid_config(format!("Failed to parse configuration JSON: {}", e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Validate all configuration parameters
    ///
    /// # Validation Rules
    ///
    /// - Max dimension: positive when set
    /// - Foreground threshold: finite, 0.0-1.0
    /// - JPEG quality: 0-100
    /// - Thread count: at most 256
    ///
    /// # Errors
    /// - Any parameter outside its valid range
    pub fn validate(&self) -> Result<()> {
        if self.max_dimension == Some(0) {
            return Err(CompositeError::config_value_error(
                "max dimension",
                0,
                "1 or greater",
                Some(1024),
            ));
        }

        if let Some(threshold) = self.foreground_threshold {
            NumericValidator::validate_percentage(threshold).map_err(|_| {
                CompositeError::config_value_error(
                    "foreground threshold",
                    threshold,
                    "0.0-1.0",
                    Some(0.8),
                )
            })?;
        }

        NumericValidator::validate_quality(self.jpeg_quality).map_err(|_| {
            CompositeError::config_value_error("JPEG quality", self.jpeg_quality, "0-100", Some(100))
        })?;

        NumericValidator::validate_thread_count(self.num_threads)?;

        Ok(())
    }

    /// Max dimension for a request, preferring the per-request value
    #[must_use]
    pub fn effective_max_dimension(&self, request: Option<u32>) -> Option<u32> {
        request.or(self.max_dimension)
    }
}

/// Builder for `CompositeConfig`
#[derive(Debug, Default)]
pub struct CompositeConfigBuilder {
    config: CompositeConfig,
}

impl CompositeConfigBuilder {
    /// Set the maximum dimension for both images
    #[must_use]
    pub fn max_dimension(mut self, max_dimension: u32) -> Self {
        self.config.max_dimension = Some(max_dimension);
        self
    }

    /// Set the crop anchor
    #[must_use]
    pub fn crop_anchor(mut self, anchor: CropAnchor) -> Self {
        self.config.crop_anchor = anchor;
        self
    }

    /// Set the background fitting strategy
    #[must_use]
    pub fn background_fit(mut self, fit: BackgroundFit) -> Self {
        self.config.background_fit = fit;
        self
    }

    /// Switch to hard-threshold masks
    #[must_use]
    pub fn foreground_threshold(mut self, threshold: f32) -> Self {
        self.config.foreground_threshold = Some(threshold);
        self
    }

    /// Set output format
    #[must_use]
    pub fn output_format(mut self, format: OutputFormat) -> Self {
        self.config.output_format = format;
        self
    }

    /// Set JPEG quality
    #[must_use]
    pub fn jpeg_quality(mut self, quality: u8) -> Self {
        self.config.jpeg_quality = quality.min(100);
        self
    }

    /// Set output destination
    #[must_use]
    pub fn output_target(mut self, target: OutputTarget) -> Self {
        self.config.output_target = target;
        self
    }

    /// Enable or disable row-parallel compositing
    #[must_use]
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.config.parallel = parallel;
        self
    }

    /// Set the number of compositing threads (0 = global rayon pool)
    #[must_use]
    pub fn num_threads(mut self, threads: usize) -> Self {
        self.config.num_threads = threads;
        self
    }

    /// Enable debug mode
    #[must_use]
    pub fn debug(mut self, debug: bool) -> Self {
        self.config.debug = debug;
        self
    }

    /// Build the configuration
    ///
    /// # Errors
    /// - Any value rejected by [`CompositeConfig::validate`]
    pub fn build(self) -> Result<CompositeConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
