//! Mask provider implementations
//!
//! - Precomputed masks (in-memory or grayscale mask images)
//! - Tract backend (pure Rust ONNX selfie segmentation)

pub mod precomputed;

#[cfg(feature = "tract")]
pub mod tract;

// Mock providers for processor and pipeline tests
#[cfg(test)]
pub mod test_utils;

pub use self::precomputed::PrecomputedMaskProvider;

#[cfg(feature = "tract")]
pub use self::tract::{SegmenterModel, TensorLayout, TractSegmenter};
