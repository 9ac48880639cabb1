#![allow(clippy::too_many_lines)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]

//! # Selfie Background Replacement
//!
//! Replaces the background of a selfie with another image, driven by a
//! per-pixel foreground mask from a pluggable segmentation provider.
//!
//! ## Pipeline
//!
//! 1. **Load**: decode both sources (path, `file://` URI, base64, bytes or an
//!    in-memory image)
//! 2. **Normalize**: bound the longer side, convert to BGRA8, resolve EXIF
//!    orientation
//! 3. **Validate**: the background must cover the subject in both axes
//! 4. **Segment ∥ Fit**: the mask provider runs while the background is
//!    cropped (or cover-scaled) to the subject footprint
//! 5. **Composite**: alpha-aware blend, row-parallel on rayon
//! 6. **Write**: encode (JPEG at maximum quality by default) and persist as
//!    a data URI, base64 string or file
//!
//! ## Features
//!
//! - `tract` (default): ONNX selfie-segmentation provider on `tract-onnx`
//! - `webp-support` (default): WebP output
//! - `tracing-init`: subscriber setup helpers for applications
//! - `tracing-json`: JSON event output
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use selfie_bgreplace::{
//!     composite_background, CompositeConfig, OutputTarget, PrecomputedMaskProvider,
//! };
//!
//! # fn example() -> selfie_bgreplace::Result<()> {
//! let config = CompositeConfig::builder()
//!     .output_target(OutputTarget::File("out/composite.jpg".into()))
//!     .build()?;
//! let provider = PrecomputedMaskProvider::from_image_path("selfie_mask.png");
//!
//! let sink = composite_background(
//!     "selfie.jpg",
//!     "beach.jpg",
//!     Some(1024),
//!     Box::new(provider),
//!     &config,
//! )?;
//! println!("wrote {}", sink);
//! # Ok(())
//! # }
//! ```

pub mod backends;
pub mod compositor;
pub mod config;
pub mod error;
pub mod processor;
pub mod segmentation;
pub mod services;
#[cfg(feature = "tracing-init")]
pub mod tracing_config;
pub mod types;
pub mod utils;

pub use backends::PrecomputedMaskProvider;
#[cfg(feature = "tract")]
pub use backends::{SegmenterModel, TensorLayout, TractSegmenter};
pub use compositor::AlphaCompositor;
pub use config::{BackgroundFit, CompositeConfig, CompositeConfigBuilder, CropAnchor, OutputFormat, OutputTarget};
pub use error::{CompositeError, ErrorKind, Result};
pub use processor::CompositeProcessor;
pub use segmentation::{MaskProvider, SegmentationError};
pub use services::{
    ImageIOService, NoOpProgressReporter, OutputFormatHandler, ProcessingStage, ProgressReporter,
    ProgressTracker, ProgressUpdate, TracingProgressReporter,
};
pub use types::{
    CompositeRequest, CompositeResult, ImageSink, ImageSource, Mask, Orientation, PixelBuffer,
    PixelFormat, ProcessingMetadata, ProcessingTimings,
};
pub use utils::{BackgroundFitter, BufferNormalizer, DimensionValidator, NumericValidator};

#[cfg(feature = "tracing-init")]
pub use tracing_config::{init_library_tracing, TracingConfig, TracingFormat};

/// Replace the background of `subject` with `background`
///
/// Blocks until the composite is encoded and stored according to
/// `config.output_target`. `max_dimension` bounds the longer side of both
/// images and overrides `config.max_dimension` when set.
///
/// # Errors
/// - `LoadFailure` if either source cannot be decoded
/// - `DimensionMismatch` if the background is smaller than the subject
/// - `SegmentationError` if the mask provider fails
/// - `FormatError` if the mask does not match the subject
/// - `EncodeFailure` / `PersistFailure` from the output stage
pub fn composite_background(
    subject: impl Into<ImageSource>,
    background: impl Into<ImageSource>,
    max_dimension: Option<u32>,
    provider: Box<dyn MaskProvider>,
    config: &CompositeConfig,
) -> Result<ImageSink> {
    let mut request = CompositeRequest::new(subject, background);
    request.max_dimension = max_dimension;

    let mut processor = CompositeProcessor::new(config.clone(), provider)?;
    processor.process_to_sink(request)
}

/// [`composite_background`] on tokio's blocking worker pool
///
/// Must be called from within a tokio runtime.
pub async fn composite_background_async(
    subject: impl Into<ImageSource>,
    background: impl Into<ImageSource>,
    max_dimension: Option<u32>,
    provider: Box<dyn MaskProvider>,
    config: CompositeConfig,
) -> Result<ImageSink> {
    let subject = subject.into();
    let background = background.into();

    tokio::task::spawn_blocking(move || {
        composite_background(subject, background, max_dimension, provider, &config)
    })
    .await
    .map_err(|e| CompositeError::processing_stage_error("worker", &e.to_string(), None))?
}
