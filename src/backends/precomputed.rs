//! Mask providers that do not run a model
//!
//! Useful when the mask comes from elsewhere (a platform segmentation API,
//! an earlier run, a hand-painted matte) and for exercising the pipeline
//! deterministically.

use crate::segmentation::{MaskProvider, SegmentationError};
use crate::types::{Mask, PixelBuffer};
use instant::{Duration, Instant};
use std::path::PathBuf;
use tracing::{debug, info};

#[derive(Debug, Clone)]
enum MaskSource {
    /// Mask held in memory
    Mask(Mask),
    /// Grayscale image decoded on `initialize` (255 = foreground)
    ImageFile(PathBuf),
    /// Same value for every pixel of whatever image is segmented
    Uniform(f32),
}

/// Serves a mask that was produced ahead of time
#[derive(Debug, Clone)]
pub struct PrecomputedMaskProvider {
    source: MaskSource,
    loaded: Option<Mask>,
    resize_to_subject: bool,
}

impl PrecomputedMaskProvider {
    /// Serve `mask` for every request
    #[must_use]
    pub fn from_mask(mask: Mask) -> Self {
        Self {
            loaded: Some(mask.clone()),
            source: MaskSource::Mask(mask),
            resize_to_subject: false,
        }
    }

    /// Serve the grayscale mask image at `path`, loaded during `initialize`
    pub fn from_image_path<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            source: MaskSource::ImageFile(path.into()),
            loaded: None,
            resize_to_subject: false,
        }
    }

    /// Serve a constant foreground weight sized to each subject
    #[must_use]
    pub fn uniform(value: f32) -> Self {
        Self {
            source: MaskSource::Uniform(value),
            loaded: None,
            resize_to_subject: false,
        }
    }

    /// Bilinearly resample the stored mask onto each subject's grid
    ///
    /// Without this, a stored mask of the wrong size is returned unchanged
    /// and rejected by the compositor.
    #[must_use]
    pub fn resize_to_subject(mut self, enabled: bool) -> Self {
        self.resize_to_subject = enabled;
        self
    }
}

impl MaskProvider for PrecomputedMaskProvider {
    fn name(&self) -> &str {
        match self.source {
            MaskSource::Mask(_) => "precomputed",
            MaskSource::ImageFile(_) => "mask-image",
            MaskSource::Uniform(_) => "uniform",
        }
    }

    fn initialize(&mut self) -> Result<Option<Duration>, SegmentationError> {
        let MaskSource::ImageFile(path) = &self.source else {
            return Ok(None);
        };
        if self.loaded.is_some() {
            return Ok(None);
        }

        let start = Instant::now();
        let image = image::open(path).map_err(|e| {
            SegmentationError::model_load(format!(
                "Failed to read mask image '{}': {}",
                path.display(),
                e
            ))
        })?;
        let mask = Mask::from_luma(&image.to_luma8());
        info!(
            "Loaded mask image {}x{} from {}",
            mask.width(),
            mask.height(),
            path.display()
        );
        self.loaded = Some(mask);
        Ok(Some(start.elapsed()))
    }

    fn segment(&mut self, image: &PixelBuffer) -> Result<Mask, SegmentationError> {
        if let MaskSource::Uniform(value) = self.source {
            return Ok(Mask::filled(image.width(), image.height(), value));
        }

        let mask = self.loaded.as_ref().ok_or(SegmentationError::NotInitialized)?;
        if self.resize_to_subject && mask.dimensions() != image.dimensions() {
            debug!(
                "Resampling stored mask {}x{} to {}x{}",
                mask.width(),
                mask.height(),
                image.width(),
                image.height()
            );
            return Ok(mask.resized(image.width(), image.height()));
        }
        Ok(mask.clone())
    }

    fn is_initialized(&self) -> bool {
        !matches!(self.source, MaskSource::ImageFile(_)) || self.loaded.is_some()
    }
}
