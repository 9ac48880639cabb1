//! Mask provider abstraction
//!
//! The compositor never looks inside a segmentation model. It consumes a
//! [`Mask`] aligned 1:1 with the subject buffer, produced by any type
//! implementing [`MaskProvider`]. Alternate sources (different models,
//! precomputed masks, test doubles) plug in here without touching the
//! compositing code.

use crate::types::{Mask, PixelBuffer};
use instant::Duration;
use thiserror::Error;

/// Errors raised by a mask provider
#[derive(Error, Debug)]
pub enum SegmentationError {
    /// Model file could not be read or compiled
    #[error("Model error: {0}")]
    ModelLoad(String),

    /// `segment` was called before `initialize`
    #[error("Mask provider not initialized")]
    NotInitialized,

    /// Model execution failed
    #[error("Inference error: {0}")]
    Inference(String),

    /// Model produced an output that cannot be turned into a mask
    #[error("Invalid model output: {0}")]
    InvalidOutput(String),

    /// Any other provider-specific failure
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SegmentationError {
    /// Create a new model loading error
    pub fn model_load<S: Into<String>>(msg: S) -> Self {
        Self::ModelLoad(msg.into())
    }

    /// Create a new inference error
    pub fn inference<S: Into<String>>(msg: S) -> Self {
        Self::Inference(msg.into())
    }

    /// Create a new invalid output error
    pub fn invalid_output<S: Into<String>>(msg: S) -> Self {
        Self::InvalidOutput(msg.into())
    }
}

/// Capability that turns a subject buffer into a foreground probability mask
///
/// Implementations must return a mask with exactly the subject's width and
/// height, holding values in `[0.0, 1.0]`. The compositor checks the
/// geometry but not the value range.
pub trait MaskProvider: Send {
    /// Short identifier used in logs and errors
    fn name(&self) -> &str;

    /// Prepare the provider (load models, allocate sessions)
    ///
    /// Returns the time spent loading, or `None` when nothing had to be done.
    ///
    /// # Errors
    /// - Model loading or validation failures
    fn initialize(&mut self) -> Result<Option<Duration>, SegmentationError> {
        Ok(None)
    }

    /// Produce a foreground mask for `image`
    ///
    /// # Errors
    /// - Provider not initialized
    /// - Model inference failures
    /// - Model output that cannot be mapped onto the image grid
    fn segment(&mut self, image: &PixelBuffer) -> Result<Mask, SegmentationError>;

    /// Whether `initialize` has completed
    fn is_initialized(&self) -> bool {
        true
    }
}

impl<T: MaskProvider + ?Sized> MaskProvider for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn initialize(&mut self) -> Result<Option<Duration>, SegmentationError> {
        (**self).initialize()
    }

    fn segment(&mut self, image: &PixelBuffer) -> Result<Mask, SegmentationError> {
        (**self).segment(image)
    }

    fn is_initialized(&self) -> bool {
        (**self).is_initialized()
    }
}
